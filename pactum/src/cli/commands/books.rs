//! Bookstore command handler
//!
//! A small in-memory catalog behind a contracted async lookup. Every query
//! must only name known categories, and every returned book must be by a
//! known author.

use anyhow::{Context, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use pactum_core::{AsyncContracted, Condition, Contract, ContractsConfig, Post, awaited_all};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use crate::cli::app::BooksArgs;

const CATALOG: &[(&str, &str, &str)] = &[
    ("sci-fi", "The Blazing World", "Margaret Cavendish"),
    ("romance", "Pride and Prejudice", "Jane Austen"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    pub identifier: String,
    pub author: String,
}

#[derive(Debug)]
pub struct Query {
    pub categories: Vec<String>,
}

#[derive(Debug, Error)]
pub enum BookError {
    #[error("No books in category {0:?}")]
    UnknownCategory(String),
}

type FindBooks = for<'a> fn(&'a mut Query) -> BoxFuture<'a, std::result::Result<Vec<Book>, BookError>>;

pub type ListBooks = AsyncContracted<Query, Vec<Book>, BookError, FindBooks>;

async fn get_categories() -> Vec<&'static str> {
    tokio::task::yield_now().await;
    CATALOG.iter().map(|(category, _, _)| *category).collect()
}

async fn has_category(category: &str) -> bool {
    get_categories().await.contains(&category)
}

async fn has_author(author: &str) -> bool {
    tokio::task::yield_now().await;
    CATALOG.iter().any(|(_, _, known)| *known == author)
}

fn find_books(query: &mut Query) -> BoxFuture<'_, std::result::Result<Vec<Book>, BookError>> {
    async move {
        debug!(categories = ?query.categories, "looking up books");
        query
            .categories
            .iter()
            .map(|category| {
                CATALOG
                    .iter()
                    .find(|(known, _, _)| *known == category.as_str())
                    .map(|(_, identifier, author)| Book {
                        identifier: identifier.to_string(),
                        author: author.to_string(),
                    })
                    .ok_or_else(|| BookError::UnknownCategory(category.clone()))
            })
            .collect()
    }
    .boxed()
}

/// Build the contracted book lookup
pub fn list_books(config: ContractsConfig) -> Result<ListBooks> {
    let list_books = Contract::<Query, Vec<Book>>::new("list_books")
        .with_config(config)
        .require(Condition::try_future("every category is known", |query: &Query| {
            awaited_all(query.categories.iter().map(|category| has_category(category).boxed())).boxed()
        }))
        .ensure(Condition::try_future("every author is known", |post: &Post<Query, Vec<Book>>| {
            awaited_all(post.result.iter().map(|book| has_author(&book.author).boxed())).boxed()
        }))
        .wrap_async(find_books as FindBooks)
        .context("Failed to attach the list_books contract")?;

    Ok(list_books)
}

/// Handle the books command
pub async fn execute(args: BooksArgs, config: Option<PathBuf>) -> Result<()> {
    let config = ContractsConfig::load_or_default(config.as_deref())?;
    let list_books = list_books(config)?;

    info!("Listing books for categories {:?}", args.categories);
    let books = match list_books.call(Query { categories: args.categories }).await {
        Ok(books) => books,
        Err(err) => {
            if args.json {
                if let Some(violation) = err.violation() {
                    println!("{}", violation.to_json()?);
                }
            }
            return Err(err.into());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&books)?);
    } else {
        for book in &books {
            println!("{} by {}", book.identifier, book.author);
        }
    }

    Ok(())
}
