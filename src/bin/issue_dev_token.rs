// Mint a bearer token for local testing of the protected chat and appointment routes.
//
// Usage: cargo run --bin issue_dev_token -- <user_id> [name] [user_type] [hours]
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::RngCore;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    sub: String,
    name: String,
    user_type: String,
    exp: usize,
    iat: usize,
}

const USER_TYPES: [&str; 4] = ["buyer", "seller", "expert", "customer_service"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let user_id = args
        .next()
        .ok_or("usage: issue_dev_token <user_id> [name] [user_type] [hours]")?;
    let name = args.next().unwrap_or_else(|| user_id.clone());
    let user_type = args.next().unwrap_or_else(|| "buyer".to_string());
    let hours: i64 = match args.next() {
        Some(raw) => raw.parse()?,
        None => 24,
    };

    if !USER_TYPES.contains(&user_type.as_str()) {
        return Err(format!("user_type must be one of: {}", USER_TYPES.join(", ")).into());
    }

    println!("🔐 Realty Hub - Development Token");
    println!("==================================");

    let secret = match std::env::var("JWT_SECRET").ok().filter(|s| !s.trim().is_empty()) {
        Some(secret) => secret,
        None => {
            // Generate a 256-bit key so the token and the server can share it
            let mut key = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut key);
            let secret = STANDARD.encode(key);
            println!();
            println!("JWT_SECRET is not set. Add this line to your .env file and restart the server:");
            println!("JWT_SECRET={}", secret);
            secret
        }
    };

    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        name,
        user_type,
        exp: (now + Duration::hours(hours)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))?;

    println!();
    println!("User:    {} ({}, {})", claims.sub, claims.name, claims.user_type);
    println!("Expires: {} hours from now", hours);
    println!();
    println!("Authorization: Bearer {}", token);
    println!();
    println!("WebSocket: /api/chat/subscribe/<conversation_id>?token={}", token);

    Ok(())
}
