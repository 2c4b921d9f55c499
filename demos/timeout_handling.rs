//! Timeout handling example

use expecto::{ExpectError, Session, Stream};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("expecto - Timeout Handling Example");
    println!("{}", "=".repeat(50));

    // Example 1: Successful match within timeout
    println!("\n1. Match within timeout");
    let mut session = Session::builder()
        .timeout(Duration::from_secs(2))
        .spawn("sleep 0.1 && echo Quick response")?;

    match session.expect("Quick").await {
        Ok(session) => println!(
            "   ✓ Matched, left over: {:?}",
            String::from_utf8_lossy(session.remaining(Stream::Stdout))
        ),
        Err(e) => println!("   ✗ Error: {e}"),
    }

    // Example 2: Timeout while waiting for output
    println!("\n2. Timeout waiting for output");
    let mut session = Session::builder()
        .timeout(Duration::from_millis(500))
        .spawn("echo -n 'Not quite'; sleep 2")?;

    match session.expect("NEVER_APPEARS").await {
        Ok(_) => println!("   ✗ Unexpectedly matched"),
        Err(e @ ExpectError::TimedOut { .. }) => {
            println!("   ✓ {e}");
            println!(
                "     stdout so far: {:?}",
                e.remaining_in_stdout().unwrap_or_default()
            );
        }
        Err(e) => println!("   ✗ Unexpected error: {e}"),
    }

    // Example 3: A hung process is killed when waiting for its exit times out
    println!("\n3. Waiting for a hung process to exit");
    let mut session = Session::builder()
        .timeout(Duration::from_millis(300))
        .spawn("sleep 10")?;

    match session.expect_exit_code(0).await {
        Ok(_) => println!("   ✗ Unexpectedly exited"),
        Err(e) if e.is_timeout() => {
            println!("   ✓ {e}");
            println!("     session closed: {}", session.is_closed());
        }
        Err(e) => println!("   ✗ Unexpected error: {e}"),
    }

    // Example 4: One slow step without raising the session timeout
    println!("\n4. Per-call timeout");
    let mut session = Session::spawn("sleep 0.5; echo finally")?;
    let matcher = expecto::ExactMatcher::new("finally")?;
    session
        .expect_within(Stream::Stdout, &matcher, Duration::from_secs(2))
        .await?;
    println!(
        "   ✓ Matched with a 2s deadline, session timeout still {:?}",
        session.timeout()
    );

    println!("\n✓ Timeout handling examples complete!");

    Ok(())
}
