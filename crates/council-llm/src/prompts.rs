//! Prompt templates for analysts and the planner
//!
//! Every role has a system prompt restricting its focus and a debate
//! directive. Request, revision and planning prompts are MiniJinja
//! templates rendered from the engine's task types.

use council_core::{PeerPosition, Proposal, ProposalTask, Request, RevisionTask, Role};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::Result;

const PROPOSAL_TEMPLATE: &str = "proposal";
const REVISION_TEMPLATE: &str = "revision";
const PLANNER_TEMPLATE: &str = "planner";

const PROPOSAL: &str = r#"Focus ticker: {{ subject }}
Horizon: {{ horizon }}
Market context: {{ context or "General market conditions" }}
As of: {{ as_of }}

YOUR ROLE: {{ role_title }} Analyst
{% if hint %}
TASK FROM THE COORDINATOR: {{ hint }}
{% endif %}

Produce a JSON object with keys:
  action: BUY/SELL/HOLD recommendation string
  conviction: float 0-1 for confidence (see scale below)
  thesis: brief paragraph summary
  evidence: array of 2-4 specific bullet strings citing data/reports
  caveats: array of risk warnings
  neutral: true only if you have no usable signal at all

Conviction scale (use the full range):
  0.90-1.00: multiple strong signals align, low downside risk
  0.75-0.89: clear directional signals with solid evidence
  0.60-0.74: favorable setup but some uncertainty remains
  0.45-0.59: weak signals or mixed evidence
  0.20-0.44: highly uncertain or contradictory data
  0.00-0.19: insufficient data or neutral stance

Respond with the JSON object only."#;

const REVISION: &str = r#"=== DEBATE ROUND {{ round }} ===

YOUR ORIGINAL POSITION:
Action: {{ prior.action }}
Conviction: {{ prior.conviction }}
Thesis: {{ prior.thesis }}
Evidence:
{% for item in prior.evidence %}
  - {{ item }}
{% else %}
  (none provided)
{% endfor %}
Caveats:
{% for item in prior.caveats %}
  - {{ item }}
{% else %}
  (none provided)
{% endfor %}

{% if opposing %}
OPPOSING POSITIONS (focus your rebuttal here):
{% for peer in opposing %}

{{ peer.role }} argues for {{ peer.action }} (conviction: {{ peer.conviction }}):
  Thesis: {{ peer.thesis }}
  Evidence:
{% for item in peer.evidence %}
    - {{ item }}
{% else %}
    (none provided)
{% endfor %}
{% endfor %}
{% endif %}
{% if supporting %}

SUPPORTING POSITIONS:
{% for peer in supporting %}

{{ peer.role }}: {{ peer.action }} (conviction: {{ peer.conviction }})
  Thesis: {{ peer.thesis }}
  Evidence:
{% for item in peer.evidence %}
    - {{ item }}
{% else %}
    (none provided)
{% endfor %}
{% endfor %}
{% endif %}
{% if not opposing and not supporting %}
No peer positions available.
{% endif %}

DEBATE DIRECTIVE:
{{ directive }}

YOUR TASK:
1. Review opposing arguments and their specific evidence
2. Address each key counterargument directly
3. Strengthen your position OR revise it if the opposing evidence is compelling
4. Update your conviction based on debate quality:
   - If your evidence withstands scrutiny, maintain or increase conviction
   - If opponents raise valid concerns, reduce conviction
   - If arguments are balanced, move toward HOLD

Return the updated JSON object with the same keys."#;

const PLANNER: &str = r#"Create an analysis plan.

TASK: Analyze {{ subject }} for a {{ horizon }}-term investment decision
MARKET CONTEXT: {{ context or "General market conditions" }}

AVAILABLE ANALYSTS:
{% for analyst in analysts %}
{{ loop.index }}. {{ analyst.role }} - {{ analyst.summary }}
{% endfor %}

INSTRUCTIONS:
1. Decide which analysts are most relevant for this task
2. Specify what each selected analyst should focus on

OUTPUT FORMAT (JSON):
{
    "roles": [{% for analyst in analysts %}"{{ analyst.role }}"{% if not loop.last %}, {% endif %}{% endfor %}],
    "tasks": {
{% for analyst in analysts %}
        "{{ analyst.role }}": "What this analyst should focus on"{% if not loop.last %},{% endif %}

{% endfor %}
    },
    "reasoning": "Brief explanation of the plan"
}

Be strategic: you do not always need every analyst. Respond with the JSON object only."#;

/// System prompt for the planner
pub const PLANNER_SYSTEM_PROMPT: &str = "You are a strategic trading analysis coordinator.";

/// System prompt restricting a role to its own evidence
pub fn system_prompt(role: Role) -> &'static str {
    match role {
        Role::Technical => {
            "You are a TECHNICAL ANALYST specializing in price action and indicators.\n\n\
             YOUR EXCLUSIVE FOCUS:\n\
             - Price trends, support/resistance levels\n\
             - Technical indicators (RSI, MACD, Bollinger Bands, moving averages)\n\
             - Volume patterns and momentum\n\
             - Chart patterns and breakouts\n\n\
             YOU MUST NOT analyze:\n\
             - News headlines or sentiment (the news analyst covers them)\n\
             - Company fundamentals such as earnings, revenue or P/E (the fundamental analyst covers them)\n\n\
             Base your recommendation ONLY on technical signals and price action."
        }
        Role::News => {
            "You are a NEWS AND SENTIMENT ANALYST specializing in market-moving events.\n\n\
             YOUR EXCLUSIVE FOCUS:\n\
             - Recent news headlines and their market impact\n\
             - Regulatory announcements and policy changes\n\
             - Sentiment shifts from news events\n\
             - Macro economic news\n\n\
             YOU MUST NOT analyze:\n\
             - Technical indicators such as RSI, MACD or moving averages (the technical analyst covers them)\n\
             - Financial ratios such as P/E, revenue or margins (the fundamental analyst covers them)\n\n\
             Base your recommendation ONLY on news sentiment and event analysis."
        }
        Role::Fundamental => {
            "You are a FUNDAMENTAL ANALYST specializing in company valuation and financials.\n\n\
             YOUR EXCLUSIVE FOCUS:\n\
             - Valuation metrics (P/E ratio, market cap, P/B ratio)\n\
             - Financial health (revenue, earnings, profit margins, debt)\n\
             - Business fundamentals and competitive position\n\
             - Long-term growth prospects\n\n\
             YOU MUST NOT analyze:\n\
             - Technical indicators such as RSI, MACD or moving averages (the technical analyst covers them)\n\
             - Recent news or sentiment (the news analyst covers them)\n\n\
             Base your recommendation ONLY on fundamental business metrics and valuation."
        }
    }
}

/// How a role should argue during debate
pub fn debate_directive(role: Role) -> &'static str {
    match role {
        Role::Technical => {
            "Respond with TECHNICAL EVIDENCE (price levels, indicator values, volume) \
             that clarifies why your proposal remains valid or requires adjustment."
        }
        Role::News => {
            "Explain how your NEWS AND SENTIMENT perspective supports or challenges \
             the other proposals. Address conflicts directly and cite specific news sources."
        }
        Role::Fundamental => {
            "Argue for or revise your thesis using FUNDAMENTAL METRICS (P/E, revenue, margins). \
             Reconcile any conflicts with peers' perspectives."
        }
    }
}

/// One-line description of a role, shown to the planner
pub fn role_summary(role: Role) -> &'static str {
    match role {
        Role::Technical => "analyzes price action, technical indicators and chart patterns",
        Role::News => "analyzes news events, sentiment and market-moving announcements",
        Role::Fundamental => "analyzes financial metrics, valuation and business fundamentals",
    }
}

#[derive(Serialize)]
struct PositionView {
    role: &'static str,
    action: &'static str,
    conviction: String,
    thesis: String,
    evidence: Vec<String>,
    caveats: Vec<String>,
}

impl From<&Proposal> for PositionView {
    fn from(p: &Proposal) -> Self {
        Self {
            role: p.role().as_str(),
            action: p.action().as_str(),
            conviction: format!("{:.2}", p.conviction()),
            thesis: p.thesis().to_string(),
            evidence: p.evidence().to_vec(),
            caveats: p.caveats().to_vec(),
        }
    }
}

impl From<&PeerPosition> for PositionView {
    fn from(p: &PeerPosition) -> Self {
        Self {
            role: p.role.as_str(),
            action: p.action.as_str(),
            conviction: format!("{:.2}", p.conviction),
            thesis: p.thesis.clone(),
            evidence: p.evidence.clone(),
            caveats: Vec::new(),
        }
    }
}

#[derive(Serialize)]
struct AnalystView {
    role: &'static str,
    summary: &'static str,
}

/// Compiled prompt templates
pub struct PromptBook {
    env: Environment<'static>,
}

impl std::fmt::Debug for PromptBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptBook").finish_non_exhaustive()
    }
}

impl PromptBook {
    /// Compile the built-in templates
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template(PROPOSAL_TEMPLATE, PROPOSAL)?;
        env.add_template(REVISION_TEMPLATE, REVISION)?;
        env.add_template(PLANNER_TEMPLATE, PLANNER)?;
        Ok(Self { env })
    }

    /// Messages-ready prompt asking for an initial proposal
    pub fn proposal_prompt(&self, task: &ProposalTask) -> Result<String> {
        let request = &task.request;
        let rendered = self.env.get_template(PROPOSAL_TEMPLATE)?.render(context! {
            subject => request.subject(),
            horizon => request.horizon().as_str(),
            context => request.context(),
            as_of => request.as_of().to_rfc3339(),
            role_title => task.role.title(),
            hint => task.hint.as_deref(),
        })?;
        Ok(rendered)
    }

    /// Prompt asking a participant to revise its position
    ///
    /// Opposing peers come first with their full evidence, then supporting
    /// peers.
    pub fn revision_prompt(&self, task: &RevisionTask) -> Result<String> {
        let opposing: Vec<PositionView> = task.opposing().map(PositionView::from).collect();
        let supporting: Vec<PositionView> = task.supporting().map(PositionView::from).collect();

        let rendered = self.env.get_template(REVISION_TEMPLATE)?.render(context! {
            round => task.round,
            prior => PositionView::from(&task.prior),
            opposing => opposing,
            supporting => supporting,
            directive => debate_directive(task.role),
        })?;
        Ok(rendered)
    }

    /// Prompt asking the planner to choose analysts
    pub fn planner_prompt(&self, request: &Request, available: &[Role]) -> Result<String> {
        let analysts: Vec<AnalystView> = available
            .iter()
            .map(|role| AnalystView {
                role: role.as_str(),
                summary: role_summary(*role),
            })
            .collect();

        let rendered = self.env.get_template(PLANNER_TEMPLATE)?.render(context! {
            subject => request.subject(),
            horizon => request.horizon().as_str(),
            context => request.context(),
            analysts => analysts,
        })?;
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_core::{Action, Horizon};

    fn request() -> Request {
        Request::new("AAPL", Horizon::Medium)
            .unwrap()
            .with_context("Fed meeting this week")
    }

    #[test]
    fn test_system_prompts_are_role_specific() {
        assert!(system_prompt(Role::Technical).contains("TECHNICAL ANALYST"));
        assert!(system_prompt(Role::News).contains("NEWS AND SENTIMENT"));
        assert!(debate_directive(Role::Fundamental).contains("FUNDAMENTAL METRICS"));
    }

    #[test]
    fn test_proposal_prompt() {
        let book = PromptBook::new().unwrap();
        let task = ProposalTask {
            request: request(),
            role: Role::Technical,
            hint: Some("Check the 200-day average".to_string()),
        };

        let prompt = book.proposal_prompt(&task).unwrap();
        assert!(prompt.starts_with("Focus ticker: AAPL\nHorizon: medium\n"));
        assert!(prompt.contains("Market context: Fed meeting this week"));
        assert!(prompt.contains("YOUR ROLE: Technical Analyst"));
        assert!(prompt.contains("TASK FROM THE COORDINATOR: Check the 200-day average"));
    }

    #[test]
    fn test_proposal_prompt_without_context_or_hint() {
        let book = PromptBook::new().unwrap();
        let task = ProposalTask {
            request: Request::new("TSLA", Horizon::Short).unwrap(),
            role: Role::News,
            hint: None,
        };

        let prompt = book.proposal_prompt(&task).unwrap();
        assert!(prompt.contains("Market context: General market conditions"));
        assert!(!prompt.contains("TASK FROM THE COORDINATOR"));
    }

    #[test]
    fn test_revision_prompt_orders_opposing_first() {
        let book = PromptBook::new().unwrap();
        let prior = Proposal::new(Role::Technical, Action::Buy, 0.75, "Breakout confirmed")
            .with_evidence(vec!["Closed above 200-day MA".to_string()]);
        let fundamental = Proposal::new(Role::Fundamental, Action::Sell, 0.7, "Overvalued")
            .with_evidence(vec!["P/E 45 vs sector 22".to_string()]);
        let news = Proposal::new(Role::News, Action::Buy, 0.5, "Upgrade from broker");

        let task = RevisionTask {
            request: request(),
            role: Role::Technical,
            round: 1,
            prior,
            peers: vec![PeerPosition::from(&news), PeerPosition::from(&fundamental)],
        };

        let prompt = book.revision_prompt(&task).unwrap();
        let opposing = prompt.find("OPPOSING POSITIONS").unwrap();
        let supporting = prompt.find("SUPPORTING POSITIONS").unwrap();
        assert!(opposing < supporting);
        assert!(prompt.contains("fundamental argues for SELL (conviction: 0.70):"));
        assert!(prompt.contains("    - P/E 45 vs sector 22"));
        assert!(prompt.contains("  - Closed above 200-day MA"));
        assert!(prompt.contains("Caveats:\n  (none provided)"));
        assert!(prompt.contains(debate_directive(Role::Technical)));
        assert!(!prompt.contains("No peer positions available."));
    }

    #[test]
    fn test_revision_prompt_without_peers() {
        let book = PromptBook::new().unwrap();
        let task = RevisionTask {
            request: request(),
            role: Role::News,
            round: 2,
            prior: Proposal::new(Role::News, Action::Sell, 0.4, "Downgrade"),
            peers: Vec::new(),
        };

        let prompt = book.revision_prompt(&task).unwrap();
        assert!(prompt.starts_with("=== DEBATE ROUND 2 ==="));
        assert!(prompt.contains("No peer positions available."));
    }

    #[test]
    fn test_planner_prompt_lists_available_roles() {
        let book = PromptBook::new().unwrap();
        let prompt = book
            .planner_prompt(&request(), &[Role::News, Role::Fundamental])
            .unwrap();

        assert!(prompt.contains("1. news - analyzes news events"));
        assert!(prompt.contains("2. fundamental - analyzes financial metrics"));
        assert!(prompt.contains(r#""roles": ["news", "fundamental"]"#));
        assert!(!prompt.contains("technical"));
    }
}
