//! TaskPay CLI - Main entry point

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use taskpay_postback::PostbackPayload;
use taskpay_rpc::{commands, AppConfig, AppContext};

#[derive(Parser)]
#[command(name = "taskpay")]
#[command(about = "TaskPay - reward ledger and fraud control", long_about = None)]
struct Cli {
    /// Data directory path
    #[arg(short, long, default_value = "./data")]
    data: PathBuf,

    /// JSON config file; the environment surface applies when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory
    Init,

    /// Create a user
    AddUser {
        /// User ID (externally verified, opaque)
        user: String,
    },

    /// Create an offer
    AddOffer {
        /// Offer title
        title: String,
        /// Payout amount
        payout: Decimal,
        /// Category: earnable, conditional, or view_only
        #[arg(long, default_value = "earnable")]
        category: String,
        /// Expected completion time in seconds
        #[arg(long, default_value = "60")]
        duration: i64,
    },

    /// Open a task for a user
    StartTask {
        user: String,
        offer: String,
    },

    /// Submit a task completion
    CompleteTask {
        task: String,
        /// Reference to uploaded proof (screenshot id, receipt, ...)
        #[arg(long)]
        proof: Option<String>,
        /// Client device fingerprint hash
        #[arg(long)]
        device: Option<String>,
        /// Client source IP
        #[arg(long)]
        ip: Option<String>,
        /// Client user-agent hash
        #[arg(long)]
        ua: Option<String>,
    },

    /// Approve a completed task and credit its payout
    ApproveTask {
        task: String,
    },

    /// Reject a completed task
    RejectTask {
        task: String,
        /// Reason shown to the user and kept on record
        #[arg(long, default_value = "rejected by reviewer")]
        reason: String,
    },

    /// Ingest a network postback
    Postback {
        /// User ID the conversion belongs to
        #[arg(long)]
        user: String,
        /// Network transaction ID (idempotency key)
        #[arg(long)]
        transaction: String,
        /// Reported amount, verbatim as signed
        #[arg(long)]
        amount: String,
        /// Network name
        #[arg(long)]
        provider: Option<String>,
        /// Offer name as the network reports it
        #[arg(long)]
        offer_name: Option<String>,
        /// Currency code
        #[arg(long)]
        currency: Option<String>,
        /// Hex HMAC-SHA256 signature
        #[arg(long)]
        signature: Option<String>,
        /// Source IP, for rate limiting
        #[arg(long)]
        ip: Option<String>,
    },

    /// Request a withdrawal
    Withdraw {
        user: String,
        amount: Decimal,
        /// Destination UPI id
        upi: String,
    },

    /// Mark a pending withdrawal paid out
    ApproveWithdrawal {
        withdrawal: String,
        /// Payment rail reference (UTR)
        #[arg(long)]
        reference: Option<String>,
    },

    /// Reject a pending withdrawal and refund it
    RejectWithdrawal {
        withdrawal: String,
        #[arg(long, default_value = "rejected by operator")]
        reason: String,
    },

    /// Show a user's balance and stats
    Balance {
        user: String,
    },

    /// List flagged completions awaiting review
    ReviewQueue {
        #[arg(long, default_value = "50")]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env(),
    };
    let ctx = AppContext::with_config(&cli.data, config).await?;

    match cli.command {
        Commands::Init => commands::init(&ctx).await?,

        Commands::AddUser { user } => commands::add_user(&ctx, &user).await?,

        Commands::AddOffer {
            title,
            payout,
            category,
            duration,
        } => commands::add_offer(&ctx, &title, payout, &category, duration).await?,

        Commands::StartTask { user, offer } => commands::start_task(&ctx, &user, &offer).await?,

        Commands::CompleteTask {
            task,
            proof,
            device,
            ip,
            ua,
        } => {
            commands::complete_task(
                &ctx,
                &task,
                proof.as_deref(),
                device.as_deref(),
                ip.as_deref(),
                ua.as_deref(),
            )
            .await?
        }

        Commands::ApproveTask { task } => commands::approve_task(&ctx, &task).await?,

        Commands::RejectTask { task, reason } => {
            commands::reject_task(&ctx, &task, &reason).await?
        }

        Commands::Postback {
            user,
            transaction,
            amount,
            provider,
            offer_name,
            currency,
            signature,
            ip,
        } => {
            let payload = PostbackPayload {
                user_id: user,
                transaction_id: transaction,
                amount,
                provider,
                offer_name,
                currency,
                signature,
            };
            commands::postback(&ctx, payload, ip.as_deref()).await?
        }

        Commands::Withdraw { user, amount, upi } => {
            commands::withdraw(&ctx, &user, amount, &upi).await?
        }

        Commands::ApproveWithdrawal {
            withdrawal,
            reference,
        } => commands::approve_withdrawal(&ctx, &withdrawal, reference.as_deref()).await?,

        Commands::RejectWithdrawal { withdrawal, reason } => {
            commands::reject_withdrawal(&ctx, &withdrawal, &reason).await?
        }

        Commands::Balance { user } => commands::balance(&ctx, &user).await?,

        Commands::ReviewQueue { limit } => commands::review_queue(&ctx, limit).await?,
    }

    Ok(())
}
