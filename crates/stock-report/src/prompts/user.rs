//! Per-stage prompt builders
//!
//! Callers excerpt upstream text before passing it in; these functions only
//! lay the text out.

use crate::api::CompanyProfile;
use crate::symbols::SymbolSet;

/// Market analysis over a rendered performance table
pub fn market_analysis_prompt(table: &str, window_label: &str) -> String {
    format!(
        "You are a professional equity analyst. Analyze the stock performance data below.\n\n\
         Stock Performance Data ({window_label} period):\n{table}\n\n\
         Tasks:\n\
         1. Compare and rank these stocks from best to worst performing\n\
         2. Use the specific percentage numbers in your analysis\n\
         3. Explain your ranking rationale clearly\n\
         4. Keep your response concise and data-driven\n\n\
         Provide a clear, professional analysis."
    )
}

/// Company analysis for one profile
pub fn company_analysis_prompt(profile: &CompanyProfile) -> String {
    format!(
        "Provide a company analysis for {symbol}.\n\
         Company: {name}\n\
         Sector: {sector}\n\
         Market Cap: {market_cap}\n\
         Business Summary: {summary}\n\
         Recent News Headlines: {headlines}\n\n\
         Provide a concise analysis covering business overview, sector position, and recent developments.",
        symbol = profile.symbol,
        name = profile.name,
        sector = profile.sector,
        market_cap = profile.market_cap,
        summary = profile.summary,
        headlines = profile.headline_line(),
    )
}

/// Recommendations over excerpts of the market and company sections
///
/// `companies` is `(symbol, excerpt)` in report order.
pub fn recommendation_prompt(
    symbols: &SymbolSet,
    market_excerpt: &str,
    companies: &[(String, String)],
) -> String {
    let mut prompt = format!(
        "Based on the following analysis, provide investment recommendations for these stocks: {symbols}\n\n\
         Market Performance Analysis:\n{market_excerpt}\n\n\
         Company Analysis Summary:\n",
        symbols = symbols.joined(),
    );

    for (symbol, excerpt) in companies {
        prompt.push_str(&format!("{symbol}: {excerpt}\n"));
    }

    prompt.push_str(
        "\nProvide:\n\
         1. Investment recommendation for each stock\n\
         2. Risk assessment\n\
         3. Your top pick and reasoning\n\
         Keep response concise and actionable.",
    );
    prompt
}

/// Ranking-table rows over excerpts of the three narrative sections
pub fn ranking_rows_prompt(
    symbols: &SymbolSet,
    market_excerpt: &str,
    company_excerpt: &str,
    recommendations_excerpt: &str,
) -> String {
    format!(
        "Based on the following complete analysis, create ONLY the summary table rows for the investment ranking.\n\n\
         Market Analysis: {market_excerpt}\n\n\
         Company Data: {company_excerpt}\n\n\
         Recommendations: {recommendations_excerpt}\n\n\
         For each stock ({symbols}), provide one table row with:\n\
         - Stock ticker\n\
         - Investment score (1-10, where 1=Strong Buy, 10=Strong Sell)\n\
         - Brief rationale (one sentence)\n\n\
         Format as: | TICKER | SCORE | Rationale |\n\
         Provide ONLY the table rows, no headers or extra text.",
        symbols = symbols.joined(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Headline;

    #[test]
    fn test_market_prompt_embeds_table() {
        let prompt = market_analysis_prompt("| AAPL | 1.2 | 8.4 |", "6-Month");
        assert!(prompt.contains("Stock Performance Data (6-Month period):\n| AAPL | 1.2 | 8.4 |"));
        assert!(prompt.starts_with("You are a professional equity analyst."));
    }

    #[test]
    fn test_company_prompt_with_sentinels() {
        let profile = CompanyProfile::unavailable("TSLA")
            .with_headlines(vec![Headline::new("Deliveries rise")], 2);
        let prompt = company_analysis_prompt(&profile);

        assert!(prompt.contains("Provide a company analysis for TSLA."));
        assert!(prompt.contains("Sector: N/A"));
        assert!(prompt.contains("Recent News Headlines: Deliveries rise"));
    }

    #[test]
    fn test_recommendation_prompt_lists_companies_in_order() {
        let symbols = SymbolSet::parse(["MSFT", "AAPL"]).unwrap();
        let companies = vec![
            ("MSFT".to_string(), "Cloud leader".to_string()),
            ("AAPL".to_string(), "Hardware".to_string()),
        ];
        let prompt = recommendation_prompt(&symbols, "Market text", &companies);

        assert!(prompt.contains("these stocks: MSFT, AAPL"));
        let msft = prompt.find("MSFT: Cloud leader").unwrap();
        let aapl = prompt.find("AAPL: Hardware").unwrap();
        assert!(msft < aapl);
        assert!(prompt.ends_with("Keep response concise and actionable."));
    }

    #[test]
    fn test_ranking_prompt() {
        let symbols = SymbolSet::parse(["AAPL"]).unwrap();
        let prompt = ranking_rows_prompt(&symbols, "m", "c", "r");
        assert!(prompt.contains("For each stock (AAPL)"));
        assert!(prompt.contains("Format as: | TICKER | SCORE | Rationale |"));
    }
}
