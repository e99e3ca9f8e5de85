use std::process::ExitCode;

fn main() -> ExitCode {
    gdxstore::init_logging();
    match gdxstore::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
