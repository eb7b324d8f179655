//! Message handler module: command routing and scan creation

use anyhow::Result;
use log::{error, info};
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::ParseMode;

use crate::bot::scan_flow;
use crate::bot::BotContext;
use crate::localization::t_lang;

/// Entry point for every inbound message
pub async fn message_handler(bot: Bot, msg: Message, context: std::sync::Arc<BotContext>) -> Result<()> {
    if msg.text().is_some() {
        handle_text_message(&bot, &msg, &context).await?;
    } else if msg.photo().is_some() {
        handle_photo_message(&bot, &msg, &context).await?;
    } else {
        handle_unsupported_message(&bot, &msg).await?;
    }

    Ok(())
}

/// Extract the user's language code from Telegram
fn language_code(msg: &Message) -> Option<&str> {
    msg.from
        .as_ref()
        .and_then(|user| user.language_code.as_ref())
        .map(|code| code.as_str())
}

async fn handle_text_message(bot: &Bot, msg: &Message, context: &BotContext) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let language_code = language_code(msg);

    // Handle /start command
    if text == "/start" {
        let hello_message = format!(
            "*{}*\n\n{}\n{}\n{}\n{}\n{}\n\n{}",
            t_lang("hello-title", language_code),
            t_lang("hello-description", language_code),
            t_lang("hello-feature-additives", language_code),
            t_lang("hello-feature-hazard", language_code),
            t_lang("hello-feature-recommendations", language_code),
            t_lang("hello-feature-allergens", language_code),
            t_lang("hello-send", language_code)
        );
        bot.send_message(msg.chat.id, hello_message)
            .parse_mode(ParseMode::Markdown)
            .await?;
    }
    // Handle /help command
    else if text == "/help" {
        let help_message = format!(
            "*{}*\n\n{}\n{}\n{}\n{}\n\n{}",
            t_lang("help-title", language_code),
            t_lang("help-step-photo", language_code),
            t_lang("help-step-text", language_code),
            t_lang("help-step-wait", language_code),
            t_lang("help-step-result", language_code),
            t_lang("help-commands", language_code)
        );
        bot.send_message(msg.chat.id, help_message)
            .parse_mode(ParseMode::Markdown)
            .await?;
    }
    // Handle /about command
    else if text == "/about" {
        let about_message = format!(
            "*{}*\n\n{}\n\n{}",
            t_lang("about-title", language_code),
            t_lang("about-description", language_code),
            t_lang("about-data-source", language_code)
        );
        bot.send_message(msg.chat.id, about_message)
            .parse_mode(ParseMode::Markdown)
            .await?;
    }
    // Handle /disclaimer command
    else if text == "/disclaimer" {
        let disclaimer_message = format!(
            "*{}*\n\n{}",
            t_lang("disclaimer-title", language_code),
            t_lang("disclaimer-text", language_code)
        );
        bot.send_message(msg.chat.id, disclaimer_message)
            .parse_mode(ParseMode::Markdown)
            .await?;
    }
    // Handle /scanner command
    else if text == "/scanner" {
        let scanner_message = format!(
            "*{}*\n\n{}",
            t_lang("scanner-title", language_code),
            t_lang("scanner-text", language_code)
        );
        bot.send_message(msg.chat.id, scanner_message)
            .parse_mode(ParseMode::Markdown)
            .await?;
    }
    // Unknown commands get a hint instead of a scan
    else if text.starts_with('/') {
        bot.send_message(msg.chat.id, t_lang("unknown-command", language_code))
            .await?;
    }
    // Any other text is a composition to scan
    else {
        info!("Received composition text from user {}", msg.chat.id);

        let snapshot = match context.client.create_text_scan(text).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Text scan creation failed for user {}: {e}", msg.chat.id);
                bot.send_message(msg.chat.id, t_lang("error-create-failed", language_code))
                    .await?;
                return Ok(());
            }
        };

        scan_flow::run_scan(bot, msg, context, &snapshot.id, language_code).await?;
    }

    Ok(())
}

async fn handle_photo_message(bot: &Bot, msg: &Message, context: &BotContext) -> Result<()> {
    let language_code = language_code(msg);

    info!("Received photo from user {}", msg.chat.id);

    // If the message carries several sizes, take the largest one
    let Some(largest_photo) = msg.photo().and_then(|photos| photos.last()) else {
        return Ok(());
    };

    let file = bot.get_file(largest_photo.file.id.clone()).await?;
    let photo_url = format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    );

    let snapshot = match context.client.create_photo_scan(&photo_url).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("Photo scan creation failed for user {}: {e}", msg.chat.id);
            bot.send_message(msg.chat.id, t_lang("error-create-failed", language_code))
                .await?;
            return Ok(());
        }
    };

    scan_flow::run_scan(bot, msg, context, &snapshot.id, language_code).await?;

    Ok(())
}

async fn handle_unsupported_message(bot: &Bot, msg: &Message) -> Result<()> {
    let language_code = language_code(msg);

    info!("Received unsupported content from user {}", msg.chat.id);
    let help_message = format!(
        "{}\n\n{}",
        t_lang("unsupported-title", language_code),
        t_lang("unsupported-hint", language_code)
    );
    bot.send_message(msg.chat.id, help_message).await?;
    Ok(())
}
