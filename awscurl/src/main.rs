use awscurl::{Args, Awscurl};
use awscurl_core::{Context, OsEnv};
use awscurl_file_read_tokio::TokioFileRead;
use awscurl_http_send_reqwest::ReqwestHttpSend;
use clap::Parser;
use log::LevelFilter;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Args::parse();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if args.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let http = match ReqwestHttpSend::try_new(false) {
        Ok(http) => http,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let ctx = Context::new()
        .with_file_read(TokioFileRead)
        .with_http_send(http)
        .with_env(OsEnv);

    let mut stdout = std::io::stdout().lock();
    match runtime.block_on(Awscurl::new(ctx).run(&args, &mut stdout)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::debug!("{err:?}");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
