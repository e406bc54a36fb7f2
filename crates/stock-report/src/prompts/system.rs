//! System prompts for the report narrators

/// Market analyst: compares price performance
pub const MARKET_ANALYST: &str = "Analyzes and compares stock performance over time.";

/// Company researcher: profiles and news
pub const COMPANY_RESEARCHER: &str = "Fetches company profiles, financials, and latest news.";

/// Stock strategist: recommendations
pub const STOCK_STRATEGIST: &str = "Provides investment insights and recommends top stocks.";

/// Team lead: final report and ranking
pub const TEAM_LEAD: &str = r"Aggregates stock analysis, company research, and investment strategy.

Instructions:
- Create a structured investment report with 4 sections
- Present information clearly and concisely
- Focus on actionable insights";

/// Appended to every role so output renders inside the report
pub const MARKDOWN_OUTPUT: &str = "Format your answer in Markdown.";
