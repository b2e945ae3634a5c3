use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

pub fn create_progress_bar(multi: &MultiProgress, total_files: u64) -> Result<ProgressBar> {
    let pb = multi.add(ProgressBar::new(total_files));
    pb.set_style(ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos}/{len} files ({percent}%)\n{msg} | elapsed: {elapsed_precise} | ETA: {eta_precise}",
    )?);

    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb.set_message("starting conversion");
    Ok(pb)
}

pub fn create_spinner(multi: &MultiProgress, message: &str) -> Result<ProgressBar> {
    let pb = multi.add(ProgressBar::new_spinner());
    pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb.set_message(message.to_string());
    Ok(pb)
}
