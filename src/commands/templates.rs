use colored::Colorize;
use prettytable::{format, row, Table};

use super::truncate;
use crate::client::ResumeClient;
use crate::error::Result;

/// `cvforge templates [--page N] [--page-size M]`
pub async fn list(client: &ResumeClient, page: u32, page_size: u32) -> Result<()> {
    let collection = client.templates(page, page_size).await?;
    let meta = collection.meta;

    if collection.is_past_end() {
        println!(
            "{}",
            format!(
                "Page {} is past the last page ({} of {} items).",
                meta.page, meta.total_pages, meta.total
            )
            .yellow()
        );
        return Ok(());
    }
    if collection.items.is_empty() {
        println!("{}", "No generated PDFs yet.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(row!["ID".bold(), "Title".bold(), "Created".bold(), "PDF".bold()]);
    for item in &collection.items {
        table.add_row(row![
            item.id.cyan(),
            truncate(&item.title, 40),
            item.created_at.format("%Y-%m-%d"),
            item.pdf_url
        ]);
    }
    table.printstd();

    println!(
        "Page {} of {} ({} total)",
        meta.page, meta.total_pages, meta.total
    );
    if collection.has_next() {
        println!(
            "Next: {}",
            format!("cvforge templates --page {} --page-size {}", meta.page + 1, meta.page_size)
                .cyan()
        );
    }
    Ok(())
}

/// `cvforge template <id>`
pub async fn show(client: &ResumeClient, id: &str) -> Result<()> {
    let item = client.template(id).await?;
    println!("{}", item.title.bold());
    println!("{} {}", "ID:     ".bold(), item.id);
    println!("{} {}", "Created:".bold(), item.created_at.format("%Y-%m-%d %H:%M"));
    println!("{} {}", "PDF:    ".bold(), item.pdf_url.cyan());
    if let Some(image) = &item.image_url {
        println!("{} {}", "Preview:".bold(), image);
    }
    if let Some(conversation) = &item.conversation_id {
        println!("{} {}", "Chat:   ".bold(), conversation);
    }
    Ok(())
}
