use colored::Colorize;
use prettytable::{format, row, Table};

use super::truncate;
use crate::client::ResumeClient;
use crate::error::Result;
use crate::models::{filter_conversations, ChatReply, Message, Role};

/// `cvforge chats list [--search <text>]`
pub async fn list(client: &ResumeClient, search: Option<&str>) -> Result<()> {
    let all = client.conversations().await?;
    if all.is_empty() {
        println!("{}", "No conversations yet.".yellow());
        println!("Start one with {}", "cvforge chats new \"<message>\"".cyan());
        return Ok(());
    }

    let conversations = filter_conversations(&all, search.unwrap_or(""));
    if conversations.is_empty() {
        println!(
            "{}",
            format!("No conversations match \"{}\".", search.unwrap_or("")).yellow()
        );
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(row![
        "ID".bold(),
        "Title".bold(),
        "Last message".bold(),
        "Updated".bold()
    ]);

    for conversation in conversations {
        table.add_row(row![
            conversation.id.cyan(),
            truncate(&conversation.title, 40),
            truncate(conversation.last_message.as_deref().unwrap_or("-"), 50),
            conversation.updated_at.format("%Y-%m-%d %H:%M")
        ]);
    }

    table.printstd();
    Ok(())
}

/// `cvforge chats show <id>`
pub async fn show(client: &ResumeClient, id: &str) -> Result<()> {
    let conversation = client.conversation(id).await?;
    println!("{}", conversation.title.bold());
    println!();
    if conversation.messages.is_empty() {
        println!("{}", "No messages.".yellow());
    }
    for message in &conversation.messages {
        print_message(message);
    }
    Ok(())
}

fn print_message(message: &Message) {
    let who = match message.role {
        Role::User => "you".blue().bold(),
        Role::Assistant => "assistant".magenta().bold(),
    };
    println!(
        "{} {}",
        who,
        message.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed()
    );
    println!("{}", message.content);
    if let Some(url) = &message.pdf_url {
        println!("{} {}", "PDF:".bold(), url.cyan());
    }
    println!();
}

fn print_reply(reply: &ChatReply) {
    match reply.assistant_text() {
        Some(text) if !text.is_empty() => println!("{}", text),
        _ => println!("{}", "(no reply text)".dimmed()),
    }
    if let ChatReply::Assistant(ai) = reply {
        if let Some(url) = &ai.pdf_url {
            println!("{} {}", "PDF:".bold(), url.cyan());
        }
    }
}

/// `cvforge chats send <id> <text>`
pub async fn send(client: &ResumeClient, id: &str, text: &str) -> Result<()> {
    let reply = client.send_message(id, text).await?;
    print_reply(&reply);
    Ok(())
}

/// `cvforge chats new <text>`
pub async fn create(client: &ResumeClient, text: &str) -> Result<()> {
    let created = client.create_conversation(text).await?;
    print_reply(&created.reply);
    println!();
    match &created.discovered {
        Some(conversation) => println!(
            "Conversation {} (most recently updated in your list)",
            conversation.id.cyan()
        ),
        None => println!(
            "{}",
            "Conversation created, but it did not show up in your list yet.".yellow()
        ),
    }
    Ok(())
}
