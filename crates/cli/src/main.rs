fn main() {
    if let Err(e) = smaliscope_cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
