use {
    crate::{
        api,
        arguments::Arguments,
        history::{HistoryReader, OrderHistory, Postgres},
        hub::Hub,
        intake::Intake,
        rate_limit::FixedWindow,
        shutdown::ShutdownController,
        worker::Worker,
    },
    anyhow::Context as _,
    chain::{SolRpc, Submitter, Wallet},
    clap::Parser,
    dex::{Registry, Venue, orca::Orca, raydium::Raydium},
    queue::{Enqueue, RedisQueue, RetryPolicy},
    solana_sdk::commitment_config::CommitmentConfig,
    std::{
        str::FromStr,
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
    },
    tokio::sync::watch,
};

pub async fn start(args: impl Iterator<Item = String>) {
    let args = Arguments::parse_from(args);
    observe::tracing::initialize(&args.log_filter, args.json_logs);
    observe::panic_hook::install();
    observe::metrics::setup_registry(Some("order_executor".to_string()));
    tracing::info!("running executor with validated arguments:\n{args}");
    if let Err(err) = run(args).await {
        tracing::error!(?err, "executor exited with error");
        std::process::exit(1);
    }
}

async fn run(args: Arguments) -> anyhow::Result<()> {
    let commitment = CommitmentConfig::from_str(&args.solana_commitment)
        .map_err(|_| anyhow::anyhow!("invalid commitment {:?}", args.solana_commitment))?;
    let wallet = Arc::new(
        Wallet::from_encoded(&args.wallet_private_key).context("parsing WALLET_PRIVATE_KEY")?,
    );
    tracing::info!(wallet = %wallet.pubkey(), "loaded service wallet");

    let db = database::connect(
        &args.postgres_url,
        args.postgres_pool_max,
        args.postgres_idle_timeout,
    )
    .await
    .context("connecting to postgres")?;
    let queue = Arc::new(
        RedisQueue::connect(
            &args.redis_connection(),
            &args.queue_namespace,
            RetryPolicy::default(),
        )
        .await
        .context("connecting to redis")?,
    );

    let registry = match &args.pool_config {
        Some(path) => Registry::load(path).context("loading pool config")?,
        None => {
            tracing::warn!("no pool config given; starting without routable liquidity");
            Registry::default()
        }
    };
    let rpc = SolRpc::new(args.solana_rpc_url.as_str(), commitment);
    let venues = vec![
        Venue::Raydium(Raydium::new(rpc.client(), registry.raydium)),
        Venue::Orca(Orca::new(rpc.client(), registry.orca)),
    ];
    tracing::info!(venues = venues.len(), "registered venues");

    let router = router::Router::new(
        venues,
        args.route_timeout,
        model::quote::slippage_to_bps(args.slippage),
    );
    let hub = Arc::new(Hub::new());
    let limiter = Arc::new(FixedWindow::per_minute(args.rate_limit));
    let history = Arc::new(Postgres(db.clone()));
    let worker = Arc::new(Worker::new(
        router,
        history.clone() as Arc<dyn OrderHistory>,
        hub.clone(),
        Arc::new(rpc) as Arc<dyn Submitter>,
        wallet,
        limiter,
        args.explorer_url.clone(),
        args.solana_cluster,
    ));

    let reclaimed = queue
        .reclaim_orphans()
        .await
        .context("reclaiming orphaned jobs")?;
    if reclaimed > 0 {
        tracing::info!(reclaimed, "reclaimed orphaned jobs from a previous run");
    }

    let shutdown = ShutdownController::new_shutdown_on_signal();
    let ready = Arc::new(AtomicBool::new(false));

    let consumers = tokio::spawn(queue.clone().run(
        worker,
        args.worker_concurrency,
        shutdown.subscribe(),
    ));

    tokio::spawn({
        let ready = ready.clone();
        let address = args.metrics_address;
        async move {
            if let Err(err) = observe::metrics::serve(address, ready).await {
                tracing::error!(?err, "metrics server exited");
            }
        }
    });

    let intake = Arc::new(Intake::new(
        history.clone() as Arc<dyn OrderHistory>,
        queue.clone() as Arc<dyn Enqueue>,
        hub.clone(),
    ));
    let context = api::Context {
        intake,
        hub,
        history: history as Arc<dyn HistoryReader>,
    };
    let server = tokio::spawn(api::serve(
        args.port,
        api::router(context),
        signalled(shutdown.subscribe()),
    ));

    ready.store(true, Ordering::Relaxed);
    tracing::info!("startup complete");

    shutdown.signalled().await;
    tracing::info!("shutting down");

    let drain = async {
        let (server, consumers) = tokio::join!(server, consumers);
        match server {
            Ok(Ok(())) => (),
            Ok(Err(err)) => tracing::warn!(?err, "api server error"),
            Err(err) => tracing::warn!(?err, "api server task panicked"),
        }
        if let Err(err) = consumers {
            tracing::warn!(?err, "consumer pool task panicked");
        }
    };
    if tokio::time::timeout(args.shutdown_timeout, drain)
        .await
        .is_err()
    {
        tracing::warn!("shutdown timed out; exiting with work in flight");
    }
    db.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn signalled(mut receiver: watch::Receiver<bool>) {
    while !*receiver.borrow() {
        if receiver.changed().await.is_err() {
            return;
        }
    }
}
