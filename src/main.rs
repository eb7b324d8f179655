use std::env;
use std::sync::Arc;
use teloxide::prelude::*;
use anyhow::Result;
use log::info;
use dotenv;
use env_logger;

use pomelo_bot::bot::{message_handler, BotContext};
use pomelo_bot::localization::init_localization;
use pomelo_bot::pomelo_client::PomeloClient;
use pomelo_bot::status_stream::StatusStream;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    info!("Starting Pomelo Telegram Bot");

    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Get bot token from environment
    let bot_token = env::var("TELEGRAM_BOT_TOKEN").expect("TELEGRAM_BOT_TOKEN must be set");

    // Get the scan API token from environment
    let api_token = env::var("POMELO_API_TOKEN").expect("POMELO_API_TOKEN must be set");

    // Load message catalogs
    init_localization()?;

    // Wire the scan services shared across handlers
    let client = Arc::new(PomeloClient::new(api_token));
    let stream = Arc::new(StatusStream::new());
    let context = Arc::new(BotContext::new(client, stream));

    // Initialize the bot
    let bot = Bot::new(bot_token);

    info!("Bot initialized, starting dispatcher");

    // Set up the dispatcher with the shared context
    let handler = dptree::entry().branch(Update::filter_message().endpoint({
        let context = Arc::clone(&context);
        move |bot: Bot, msg: Message| {
            let context = Arc::clone(&context);
            async move { message_handler(bot, msg, context).await }
        }
    }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
