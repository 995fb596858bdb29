use {
    chain::Cluster,
    std::{net::SocketAddr, path::PathBuf, time::Duration},
    url::Url,
};

#[derive(clap::Parser)]
pub struct Arguments {
    /// Port the order API binds on.
    #[clap(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    #[clap(long, env, default_value = "0.0.0.0:9589")]
    pub metrics_address: SocketAddr,

    /// Solana JSON RPC endpoint used for quoting and submission.
    #[clap(long, env = "SOLANA_RPC_URL", default_value = "https://api.devnet.solana.com")]
    pub solana_rpc_url: Url,

    /// Commitment level confirmations wait for: processed, confirmed or
    /// finalized.
    #[clap(long, env = "SOLANA_COMMITMENT", default_value = "confirmed")]
    pub solana_commitment: String,

    /// Cluster used for explorer links.
    #[clap(long, env = "SOLANA_CLUSTER", default_value = "devnet")]
    pub solana_cluster: Cluster,

    /// Base URL transaction signatures are linked under.
    #[clap(long, env = "EXPLORER_URL", default_value = "https://explorer.solana.com")]
    pub explorer_url: String,

    /// The signing key of the service wallet. Accepts base58, base64 or a
    /// JSON byte array.
    #[clap(long, env = "WALLET_PRIVATE_KEY", hide_env_values = true)]
    pub wallet_private_key: String,

    /// Full redis connection URL. Overrides the individual REDIS_* values.
    #[clap(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    #[clap(long, env = "REDIS_HOST", default_value = "localhost")]
    pub redis_host: String,

    #[clap(long, env = "REDIS_PORT", default_value = "6379")]
    pub redis_port: u16,

    #[clap(long, env = "REDIS_USERNAME")]
    pub redis_username: Option<String>,

    #[clap(long, env = "REDIS_PASSWORD", hide_env_values = true)]
    pub redis_password: Option<String>,

    #[clap(long, env = "REDIS_DB", default_value = "0")]
    pub redis_db: u32,

    /// Url of the Postgres database. By default connects to locally
    /// running postgres.
    #[clap(long, env = "POSTGRES_URL", default_value = "postgresql://")]
    pub postgres_url: String,

    #[clap(long, env = "POSTGRES_POOL_MAX", default_value = "10")]
    pub postgres_pool_max: u32,

    #[clap(
        long,
        env = "POSTGRES_IDLE_TIMEOUT_MS",
        default_value = "30000",
        value_parser = duration_from_millis,
    )]
    pub postgres_idle_timeout: Duration,

    /// Fractional slippage tolerance applied to every quote request, e.g.
    /// 0.01 for 1%.
    #[clap(long, env = "SLIPPAGE", default_value = "0.01")]
    pub slippage: f64,

    /// Per venue deadline for a single quote call.
    #[clap(
        long,
        env = "ROUTE_TIMEOUT_MS",
        default_value = "5000",
        value_parser = duration_from_millis,
    )]
    pub route_timeout: Duration,

    /// Orders routed per minute across all workers.
    #[clap(long, env = "RATE_LIMIT", default_value = "10")]
    pub rate_limit: u32,

    /// How many queue consumers drain jobs in parallel.
    #[clap(long, env = "WORKER_CONCURRENCY", default_value = "10")]
    pub worker_concurrency: usize,

    /// Redis key prefix of the order queue.
    #[clap(long, env = "QUEUE_NAMESPACE", default_value = "queue:orders")]
    pub queue_namespace: String,

    /// TOML file declaring the venue pools. Without it the service starts
    /// with no routable liquidity.
    #[clap(long, env = "POOL_CONFIG")]
    pub pool_config: Option<PathBuf>,

    /// Tracing filter, e.g. `executor=debug,info`.
    #[clap(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_filter: String,

    /// Emit line delimited JSON logs.
    #[clap(long, env = "JSON_LOGS")]
    pub json_logs: bool,

    /// Hard ceiling on how long shutdown waits for in-flight work.
    #[clap(
        long,
        env = "SHUTDOWN_TIMEOUT",
        default_value = "10s",
        value_parser = humantime::parse_duration,
    )]
    pub shutdown_timeout: Duration,
}

fn duration_from_millis(value: &str) -> Result<Duration, std::num::ParseIntError> {
    Ok(Duration::from_millis(value.parse()?))
}

impl Arguments {
    /// The redis connection string, either `REDIS_URL` verbatim or
    /// composed from the individual values.
    pub fn redis_connection(&self) -> String {
        if let Some(url) = &self.redis_url {
            return url.clone();
        }
        let credentials = match (&self.redis_username, &self.redis_password) {
            (Some(username), Some(password)) => format!("{username}:{password}@"),
            (Some(username), None) => format!("{username}@"),
            (None, Some(password)) => format!(":{password}@"),
            (None, None) => String::new(),
        };
        format!(
            "redis://{credentials}{}:{}/{}",
            self.redis_host, self.redis_port, self.redis_db,
        )
    }
}

impl std::fmt::Display for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "port: {}", self.port)?;
        writeln!(f, "metrics_address: {}", self.metrics_address)?;
        writeln!(f, "solana_rpc_url: {}", self.solana_rpc_url)?;
        writeln!(f, "solana_commitment: {}", self.solana_commitment)?;
        writeln!(f, "solana_cluster: {}", self.solana_cluster)?;
        writeln!(f, "explorer_url: {}", self.explorer_url)?;
        writeln!(f, "wallet_private_key: SECRET")?;
        writeln!(f, "redis_url: SECRET")?;
        writeln!(f, "postgres_url: SECRET")?;
        writeln!(f, "postgres_pool_max: {}", self.postgres_pool_max)?;
        writeln!(f, "postgres_idle_timeout: {:?}", self.postgres_idle_timeout)?;
        writeln!(f, "slippage: {}", self.slippage)?;
        writeln!(f, "route_timeout: {:?}", self.route_timeout)?;
        writeln!(f, "rate_limit: {}", self.rate_limit)?;
        writeln!(f, "worker_concurrency: {}", self.worker_concurrency)?;
        writeln!(f, "queue_namespace: {}", self.queue_namespace)?;
        writeln!(f, "pool_config: {:?}", self.pool_config)?;
        writeln!(f, "log_filter: {}", self.log_filter)?;
        writeln!(f, "json_logs: {}", self.json_logs)?;
        writeln!(f, "shutdown_timeout: {:?}", self.shutdown_timeout)?;
        Ok(())
    }
}
