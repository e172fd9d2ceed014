use std::process::ExitCode;

fn main() -> ExitCode {
    match lifeloop::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("lifeloop: {error}");
            ExitCode::FAILURE
        }
    }
}
