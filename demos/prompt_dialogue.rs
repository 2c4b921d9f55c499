//! Prompt dialogue example
//!
//! Answers the questions of a small shell script, one on stdout and one on
//! stderr, and checks the exit code.

use expecto::{Session, Stream};
use std::time::Duration;

const SCRIPT: &str = r#"
echo -n "First name: "
read fname
printf 'Favourite colour?\n > ' >&2
read colour
echo "Hello, $fname! $colour is a fine colour."
[ "$colour" = blue ]
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("expecto - Prompt Dialogue Example");
    println!("{}", "=".repeat(50));

    let mut session = Session::builder()
        .timeout(Duration::from_secs(1))
        .env("LC_ALL", "C")
        .spawn(SCRIPT)?;

    println!("\nWaiting for the name prompt...");
    session.expect("First name:").await?.sendln("Bob").await?;
    println!("✓ Answered \"Bob\"");

    println!("\nWaiting for the colour prompt on stderr...");
    session
        .expect_error("Favourite colour?")
        .await?
        .expect_error(" > ")
        .await?
        .sendln("blue")
        .await?;
    println!("✓ Answered \"blue\"");

    session.expect("Hello, Bob!").await?;
    println!(
        "✓ Greeted, rest of the line: {:?}",
        String::from_utf8_lossy(session.remaining(Stream::Stdout))
    );

    session.expect_success().await?;
    println!("\n✓ Program exited with code 0");

    Ok(())
}
