// src/alerts/format.rs

use crate::{config::WRAPPED_SOL_MINT, pipeline::PoolAlertRecord};
use std::fmt::Write;

/// Notation compacte à deux décimales : 1.50k, 2.00M, 3.10B, 4.00T, 5.00Q.
pub fn format_token_supply(value: f64) -> String {
    const UNITS: [(f64, &str); 5] = [(1e15, "Q"), (1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "k")];
    for (threshold, suffix) in UNITS {
        if value >= threshold {
            return format!("{:.2}{suffix}", value / threshold);
        }
    }
    value.to_string()
}

/// Séparateur de milliers + au plus `max_decimals` décimales, zéros de fin retirés.
pub fn format_grouped(value: f64, max_decimals: usize) -> String {
    let fixed = format!("{:.*}", max_decimals, value.abs());
    let (integer, fraction) = match fixed.split_once('.') {
        Some((integer, fraction)) => (integer, fraction.trim_end_matches('0')),
        None => (fixed.as_str(), ""),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3 + fraction.len() + 2);
    if value.is_sign_negative() && (!integer.trim_start_matches('0').is_empty() || !fraction.is_empty()) {
        grouped.push('-');
    }
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if !fraction.is_empty() {
        grouped.push('.');
        grouped.push_str(fraction);
    }
    grouped
}

/// `abcdef*****uvwxyz` pour toute adresse de plus de 14 caractères.
pub fn truncate_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 14 {
        return address.to_string();
    }
    let prefix: String = chars[..6].iter().collect();
    let suffix: String = chars[chars.len() - 6..].iter().collect();
    format!("{prefix}*****{suffix}")
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

const DESCRIPTION_MAX_CHARS: usize = 600;

/// Description échappée, coupée à `DESCRIPTION_MAX_CHARS` caractères.
pub fn description_excerpt(description: &str) -> String {
    let description = description.trim();
    let mut chars = description.char_indices();
    match chars.nth(DESCRIPTION_MAX_CHARS) {
        Some((cut, _)) => format!("{}…", escape_html(description[..cut].trim_end())),
        None => escape_html(description),
    }
}

fn yes_no(good: bool) -> &'static str {
    if good { "Yes ✅" } else { "No ⛔️" }
}

fn quote_label(record: &PoolAlertRecord) -> String {
    let mint = record.quote.mint.to_string();
    if mint == WRAPPED_SOL_MINT { "SOL".to_string() } else { truncate_address(&mint) }
}

/// Message HTML (sous-ensemble accepté par Telegram) décrivant la nouvelle pool.
pub fn render_html(record: &PoolAlertRecord) -> String {
    let name = escape_html(&record.metadata.name);
    let symbol = escape_html(&record.metadata.symbol);
    let base_mint = record.base.mint.to_string();
    let valuation = &record.valuation;

    // `write!` sur une String ne peut pas échouer.
    let mut msg = String::new();
    let _ = writeln!(msg, "{name} → ({symbol})\n");
    let _ = writeln!(msg, "Base: {} {name}", format_token_supply(record.base.ui_amount));
    let _ = writeln!(
        msg,
        "Quote: {} {} → (${})\n",
        format_token_supply(record.quote.ui_amount),
        quote_label(record),
        format_grouped(valuation.liquidity_fiat, 2)
    );
    let _ = writeln!(msg, "Token Mint → {} {name}", format_token_supply(valuation.circulating_supply));
    let _ = writeln!(msg, "Price {name} → (${})", format_grouped(valuation.price_in_fiat, 8));
    let _ = writeln!(msg, "MarketCap → (${})\n", format_grouped(valuation.market_cap_fiat, 2));
    if !record.description.trim().is_empty() {
        let _ = writeln!(msg, "{}\n", description_excerpt(&record.description));
    }

    if !record.top_holders.is_empty() {
        let _ = writeln!(msg, "🐋 Holders");
        for holder in &record.top_holders {
            let address = holder.address.to_string();
            let _ = writeln!(
                msg,
                "<a href=\"https://solscan.io/account/{address}\">{} ({:.2}%)</a>",
                truncate_address(&address),
                holder.percent_of_supply
            );
        }
        msg.push('\n');
    }

    let _ = writeln!(msg, "🔒 Risks");
    match &record.mint_risk {
        Some(mint) => {
            let _ = writeln!(msg, "Mint Authority revoked → {}", yes_no(mint.mint_authority_revoked));
            let _ = writeln!(msg, "Freeze Authority revoked → {}", yes_no(mint.freeze_authority_revoked));
            if mint.transfer_fee_basis_points > 0 {
                let _ = writeln!(msg, "Transfer Fee → {:.2}% ⛔️", f64::from(mint.transfer_fee_basis_points) / 100.0);
            }
        }
        None => {
            let _ = writeln!(msg, "Mint / Freeze Authority → unknown");
        }
    }
    let _ = writeln!(msg, "Immutable Metadata → {}", yes_no(!record.metadata.is_mutable));

    let _ = write!(
        msg,
        "<a href=\"https://birdeye.so/token/{base_mint}?chain=solana\">Birdeye</a> → \
         <a href=\"https://raydium.io/swap/?inputCurrency=sol&amp;outputCurrency={base_mint}&amp;fixed=in\">Raydium</a> → \
         <a href=\"https://dexscreener.com/solana/{base_mint}\">Dexscreener</a> → \
         <a href=\"https://rugcheck.xyz/tokens/{base_mint}\">Rug Check</a>"
    );
    msg
}
