use brazil_race_classifier_cli::{run, RunOutcome};

#[tokio::main]
async fn main() {
    match run().await {
        Ok(RunOutcome::Completed) => {}
        Ok(RunOutcome::CompletedWithFailures) => std::process::exit(1),
        Err(err) => {
            eprintln!("application error: {err}");
            std::process::exit(1);
        }
    }
}
