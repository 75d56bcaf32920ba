//! Text formatting shared by tools and resources

use std::fmt::Write as _;

use serde::Serialize;

use crate::{
    db::etfs::{Etf, RiskRating},
    errors::AppError,
};

pub const DEFAULT_ETF_LIMIT: i64 = 10;
pub const ADVICE_PICK_COUNT: i64 = 5;

pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value)
        .map_err(|err| AppError::internal(format!("failed to serialize result: {err}")))
}

pub fn format_dollars(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i128;
    let (whole, fraction) = (cents.abs() / 100, cents.abs() % 100);

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if cents < 0 { "-" } else { "" };
    format!("{sign}${grouped}.{fraction:02}")
}

pub fn format_aum(aum: f64) -> String {
    if aum >= 1e9 {
        format!("${:.1}B", aum / 1e9)
    } else {
        format!("${:.1}M", aum / 1e6)
    }
}

fn risk_guidance(risk: RiskRating) -> &'static str {
    match risk {
        RiskRating::Low => {
            "Low-risk ETFs favour capital preservation and steady income. \
             They suit short horizons or investors who cannot absorb large drawdowns."
        }
        RiskRating::Medium => {
            "Medium-risk ETFs balance growth and stability through broad diversification. \
             They suit multi-year horizons with tolerance for moderate swings."
        }
        RiskRating::High => {
            "High-risk ETFs target outsized growth through concentrated or leveraged exposure. \
             Size positions carefully and expect sharp, frequent drawdowns."
        }
    }
}

/// Renders the advice text for `risk` from the picked ETFs.
pub fn compose_advice(
    risk: RiskRating,
    investment_amount: Option<f64>,
    investment_goal: Option<&str>,
    picks: &[Etf],
) -> String {
    let mut advice = format!("ETF Investment Advice for {risk} Risk Tolerance\n\n");

    if let Some(amount) = investment_amount {
        let _ = writeln!(advice, "Investment Amount: {}", format_dollars(amount));
    }
    if let Some(goal) = investment_goal.map(str::trim).filter(|goal| !goal.is_empty()) {
        let _ = writeln!(advice, "Investment Goal: {goal}");
    }
    if investment_amount.is_some() || investment_goal.is_some() {
        advice.push('\n');
    }

    if picks.is_empty() {
        let _ = writeln!(advice, "No {risk} risk ETFs are currently available.");
    } else {
        let _ = writeln!(advice, "Top {} {risk} Risk ETFs by Assets Under Management:", picks.len());
        for (index, etf) in picks.iter().enumerate() {
            let _ = writeln!(
                advice,
                "{}. {} - {} (Price: {}, AUM: {}, Avg Volume: {})",
                index + 1,
                etf.symbol,
                etf.name,
                format_dollars(etf.price),
                format_aum(etf.aum),
                etf.avg_volume
            );
        }

        if let Some(amount) = investment_amount {
            let share = amount / picks.len() as f64;
            let _ = writeln!(advice, "\nEqual-weight allocation:");
            for etf in picks {
                let _ = writeln!(
                    advice,
                    "- {}: {} (~{:.2} shares)",
                    etf.symbol,
                    format_dollars(share),
                    if etf.price > 0.0 { share / etf.price } else { 0.0 }
                );
            }
        }
    }

    let _ = writeln!(advice, "\n{}", risk_guidance(risk));
    advice.push_str(
        "\nThis is general information, not personalized financial advice. \
         Consider consulting a licensed advisor before investing.",
    );
    advice
}

#[cfg(test)]
mod tests {
    use super::{compose_advice, format_aum, format_dollars};
    use crate::db::etfs::{Etf, RiskRating};

    fn etf(symbol: &str, price: f64) -> Etf {
        Etf {
            symbol: symbol.to_string(),
            name: format!("{symbol} Fund"),
            aum: 2_500_000_000.0,
            avg_volume: 1_000,
            price,
            risk_rating: "Low".to_string(),
        }
    }

    #[test]
    fn formats_dollars_with_grouping() {
        assert_eq!(format_dollars(0.0), "$0.00");
        assert_eq!(format_dollars(999.5), "$999.50");
        assert_eq!(format_dollars(1_234_567.891), "$1,234,567.89");
        assert_eq!(format_dollars(-12.3), "-$12.30");
    }

    #[test]
    fn formats_aum_in_billions_or_millions() {
        assert_eq!(format_aum(2_500_000_000.0), "$2.5B");
        assert_eq!(format_aum(750_000_000.0), "$750.0M");
    }

    #[test]
    fn advice_lists_picks_and_allocation() {
        let advice = compose_advice(
            RiskRating::Low,
            Some(10_000.0),
            Some("retirement"),
            &[etf("BND", 50.0), etf("SHV", 100.0)],
        );

        assert!(advice.starts_with("ETF Investment Advice for Low Risk Tolerance"));
        assert!(advice.contains("Investment Amount: $10,000.00"));
        assert!(advice.contains("Investment Goal: retirement"));
        assert!(advice.contains("1. BND - BND Fund (Price: $50.00, AUM: $2.5B"));
        assert!(advice.contains("- BND: $5,000.00 (~100.00 shares)"));
        assert!(advice.contains("- SHV: $5,000.00 (~50.00 shares)"));
        assert!(advice.contains("not personalized financial advice"));
    }

    #[test]
    fn advice_without_picks_says_so() {
        let advice = compose_advice(RiskRating::High, None, None, &[]);

        assert!(advice.contains("No High risk ETFs are currently available."));
        assert!(!advice.contains("Investment Amount"));
    }
}
