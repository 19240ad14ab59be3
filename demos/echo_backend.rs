//! Local backend for trying the proxy by hand.
//!
//! ```text
//! cargo run --example echo_backend -- 127.0.0.1:8081
//! cargo run -- --config demos/config.toml
//! curl -H 'X-Forwarded-For: 1.2.3.4' localhost:8000/local/some/path?x=1
//! ```

use std::net::SocketAddr;

use axum::{http::Request, body::Body, Router};

async fn echo(request: Request<Body>) -> String {
    let mut out = format!("{} {}\n", request.method(), request.uri());
    for (name, value) in request.headers() {
        out.push_str(&format!("{}: {}\n", name, value.to_str().unwrap_or("<binary>")));
    }
    out
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8081".to_string())
        .parse()?;

    let app = Router::new().fallback(echo);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Echo backend listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
