use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();
    ExitCode::from(gitclone::cli::run() as u8)
}
