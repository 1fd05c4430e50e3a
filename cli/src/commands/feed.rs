use anyhow::Result;
use std::process;

use crate::api::RemoteClient;
use nosh_core::models::FeedPost;

use super::helpers::truncate;

pub(crate) async fn cmd_feed_list(client: &RemoteClient, json: bool) -> Result<()> {
    let posts = client.feed_list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&posts)?);
        return Ok(());
    }

    if posts.is_empty() {
        eprintln!("The feed is empty. Use `nosh feed post` to share something.");
        process::exit(2);
    }

    for post in &posts {
        print_post(post);
        println!();
    }

    Ok(())
}

pub(crate) async fn cmd_feed_post(
    client: &RemoteClient,
    author: &str,
    body: &str,
    json: bool,
) -> Result<()> {
    let post = client.feed_post(author, body).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&post)?);
    } else {
        let id = &post.id;
        println!("Posted to the feed ({id})");
    }

    Ok(())
}

pub(crate) async fn cmd_feed_like(
    client: &RemoteClient,
    post_id: &str,
    author: &str,
    json: bool,
) -> Result<()> {
    let liked = client.feed_like(post_id, author).await?;

    if json {
        println!("{}", serde_json::json!({ "post_id": post_id, "liked": liked }));
    } else if liked {
        println!("Liked post {post_id}");
    } else {
        println!("Removed like from post {post_id}");
    }

    Ok(())
}

pub(crate) async fn cmd_feed_comment(
    client: &RemoteClient,
    post_id: &str,
    author: &str,
    body: &str,
    json: bool,
) -> Result<()> {
    client.feed_comment(post_id, author, body).await?;

    if json {
        println!("{}", serde_json::json!({ "post_id": post_id, "commented": true }));
    } else {
        println!("Commented on post {post_id}");
    }

    Ok(())
}

fn print_post(post: &FeedPost) {
    let id = truncate(&post.id, 8 + 3);
    let author = &post.author;
    let created = &post.created_at;
    let body = &post.body;
    println!("[{id}] {author} at {created}");
    println!("  {body}");
    if !post.likes.is_empty() {
        let count = post.likes.len();
        let who = post.likes.join(", ");
        println!("  {count} like(s): {who}");
    }
    for comment in &post.comments {
        let author = &comment.author;
        let body = &comment.body;
        println!("    {author}: {body}");
    }
}
