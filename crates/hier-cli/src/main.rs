//! `hiermig` entry point

#[tokio::main]
async fn main() {
    let matches = hier_cli::command().get_matches();

    if let Err(err) = hier_cli::init_tracing(matches.get_flag("log-json")) {
        eprintln!("warning: logging disabled: {err}");
    }

    let mut stdout = std::io::stdout().lock();
    if let Err(err) = hier_cli::run(&matches, &mut stdout).await {
        tracing::error!(error = %format!("{err:#}"), "command failed");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
