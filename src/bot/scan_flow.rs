//! Scan flow module: drives one tracked scan for one chat
//!
//! Consumes the tracker's event channel and mirrors it into the chat: a
//! single progress message edited in place, then the gauge photo with link
//! buttons and the detail messages on completion, or an error text on
//! failure.

use std::path::Path;

use anyhow::Result;
use log::{error, info};
use teloxide::payloads::{SendMessageSetters, SendPhotoSetters};
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, ParseMode};

use crate::adi_chart;
use crate::bot::ui_builder;
use crate::bot::BotContext;
use crate::localization::{t_args_lang, t_lang};
use crate::scan_model::ScanSnapshot;
use crate::scan_tracker::TrackEvent;

/// Track a freshly created scan and keep the chat updated until the session
/// is over
pub async fn run_scan(
    bot: &Bot,
    msg: &Message,
    context: &BotContext,
    scan_id: &str,
    language_code: Option<&str>,
) -> Result<()> {
    let user_id = msg
        .from
        .as_ref()
        .map(|user| user.id.to_string())
        .unwrap_or_else(|| msg.chat.id.to_string());

    let Some(mut updates) = context.tracker.track(&user_id, scan_id) else {
        bot.send_message(msg.chat.id, t_lang("scan-in-progress", language_code))
            .await?;
        return Ok(());
    };

    let chat_id = msg.chat.id;
    let mut progress_message: Option<MessageId> = None;
    let mut shown_text = t_lang("scan-started", language_code);
    send_or_edit(bot, chat_id, &mut progress_message, shown_text.clone()).await?;

    while let Some(update) = updates.recv().await {
        match update {
            TrackEvent::Status(status) => {
                let text = ui_builder::progress_message(&status, language_code);
                // Telegram rejects edits that leave the text unchanged
                if text != shown_text {
                    shown_text = text.clone();
                    send_or_edit(bot, chat_id, &mut progress_message, text).await?;
                }
            }
            TrackEvent::Completed(snapshot) => {
                info!("Presenting completed scan {scan_id} to chat {chat_id}");
                show_result(bot, chat_id, &mut progress_message, &snapshot, language_code).await?;
            }
            TrackEvent::Failed(reason) => {
                send_or_edit(
                    bot,
                    chat_id,
                    &mut progress_message,
                    t_args_lang("scan-error", &[("reason", reason.as_str())], language_code),
                )
                .await?;
            }
        }
    }

    Ok(())
}

/// Send a new message the first time, edit it in place afterwards
async fn send_or_edit(
    bot: &Bot,
    chat_id: ChatId,
    message_id: &mut Option<MessageId>,
    text: String,
) -> Result<()> {
    match *message_id {
        Some(id) => {
            bot.edit_message_text(chat_id, id, text).await?;
        }
        None => {
            let sent = bot.send_message(chat_id, text).await?;
            *message_id = Some(sent.id);
        }
    }
    Ok(())
}

/// Replace the progress message with the final verdict: gauge photo with
/// link buttons, then the analysis details
async fn show_result(
    bot: &Bot,
    chat_id: ChatId,
    progress_message: &mut Option<MessageId>,
    snapshot: &ScanSnapshot,
    language_code: Option<&str>,
) -> Result<()> {
    send_or_edit(
        bot,
        chat_id,
        progress_message,
        t_lang("result-loading", language_code),
    )
    .await?;

    let caption = ui_builder::result_caption(snapshot, language_code);
    let keyboard = ui_builder::ingredient_links_keyboard(snapshot, language_code);

    match adi_chart::adi_image_path(
        snapshot.additives_danger_index(),
        Path::new(adi_chart::DEFAULT_CACHE_DIR),
    ) {
        Ok(gauge_path) => {
            let mut request = bot
                .send_photo(chat_id, InputFile::file(gauge_path))
                .caption(caption)
                .parse_mode(ParseMode::Markdown);
            if let Some(keyboard) = keyboard {
                request = request.reply_markup(keyboard);
            }
            request.await?;
        }
        Err(e) => {
            // The verdict still goes out when the gauge cannot be rendered
            error!("Could not render hazard gauge: {e:?}");
            let mut request = bot
                .send_message(chat_id, caption)
                .parse_mode(ParseMode::Markdown);
            if let Some(keyboard) = keyboard {
                request = request.reply_markup(keyboard);
            }
            request.await?;
        }
    }

    bot.send_message(chat_id, ui_builder::result_details(snapshot, language_code))
        .parse_mode(ParseMode::Markdown)
        .await?;

    Ok(())
}
