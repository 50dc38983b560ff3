//! rtsp_relay - relay an IP camera RTSP stream to a local network sink
//!
//! The process:
//! 1. Parses flags (and optional config file / environment)
//! 2. Builds the stream address and the pipeline description
//! 3. Plays the pipeline and drains the passive tee branch on its own thread
//! 4. Waits on the pipeline bus until an error or end-of-stream
//! 5. Tears the pipeline down and exits

fn main() {
    std::process::exit(rtsp_relay::cli::run(std::env::args_os()));
}
