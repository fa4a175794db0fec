use std::process::ExitCode;

fn main() -> ExitCode {
    match ssz_suite::app::run_rings() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
