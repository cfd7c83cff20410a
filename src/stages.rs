//! The static stage graph: six pipeline stages and their agent rosters.
//!
//! The table is compiled into the binary and never mutated at runtime.
//! Stages are 1-based, matching how operators talk about them ("stage 3
//! failed"), and each stage names the agents that must run plus the policy
//! used to judge the stage done.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::CompletionPolicy;
use crate::errors::OrchestrationError;

/// Number of pipeline stages.
pub const STAGE_COUNT: u32 = 6;

/// A category of AI agent work bound to one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Processes and structures initial project ideas.
    IdeaProcessor,
    /// Builds comprehensive context and project scope.
    ContextBuilder,
    /// Analyzes market size, competitors, and product-market fit.
    MarketResearch,
    /// Designs system architecture and selects the tech stack.
    TechnicalArchitect,
    /// Creates user interfaces and experiences.
    UiUxDesigner,
    /// Writes frontend and backend code.
    FullStackDev,
    /// Automated testing and security scanning.
    QaSecurity,
    /// CI/CD automation and deployment.
    DevOpsPipeline,
    /// Handles business formation and compliance.
    BusinessSetup,
    /// Creates and distributes content.
    ContentMarketing,
    /// Automates sales outreach and conversion.
    SalesAutomation,
    /// 24/7 intelligent customer service.
    CustomerSupport,
    /// Real-time business intelligence.
    AnalyticsEngine,
    /// Automated accounting and finance.
    FinanceManager,
    /// Continuously optimizes all systems.
    SystemOptimizer,
}

struct AgentProfile {
    name: &'static str,
    description: &'static str,
    capabilities: &'static [&'static str],
}

impl AgentKind {
    fn profile(&self) -> AgentProfile {
        match self {
            Self::IdeaProcessor => AgentProfile {
                name: "Idea Processor",
                description: "Processes and structures initial project ideas",
                capabilities: &[
                    "idea analysis",
                    "requirement extraction",
                    "initial structuring",
                    "feasibility assessment",
                ],
            },
            Self::ContextBuilder => AgentProfile {
                name: "Context Builder",
                description: "Builds comprehensive context and project scope",
                capabilities: &[
                    "context gathering",
                    "scope definition",
                    "requirement documentation",
                    "initial planning",
                ],
            },
            Self::MarketResearch => AgentProfile {
                name: "Market Research",
                description: "Analyzes market size, competitors, and product-market fit",
                capabilities: &[
                    "market analysis",
                    "competitor research",
                    "TAM calculation",
                    "trend analysis",
                ],
            },
            Self::TechnicalArchitect => AgentProfile {
                name: "Technical Architect",
                description: "Designs system architecture and selects tech stack",
                capabilities: &[
                    "architecture design",
                    "tech stack selection",
                    "scalability planning",
                    "cost estimation",
                ],
            },
            Self::UiUxDesigner => AgentProfile {
                name: "UI/UX Designer",
                description: "Creates user interfaces and experiences",
                capabilities: &[
                    "wireframing",
                    "UI design",
                    "UX flows",
                    "responsive design",
                    "accessibility",
                ],
            },
            Self::FullStackDev => AgentProfile {
                name: "Full-Stack Dev",
                description: "Writes frontend and backend code",
                capabilities: &[
                    "React/Vue/Angular",
                    "Node.js/Python",
                    "API development",
                    "database design",
                ],
            },
            Self::QaSecurity => AgentProfile {
                name: "QA & Security",
                description: "Automated testing and security scanning",
                capabilities: &[
                    "unit testing",
                    "integration testing",
                    "security audits",
                    "penetration testing",
                ],
            },
            Self::DevOpsPipeline => AgentProfile {
                name: "DevOps Pipeline",
                description: "CI/CD automation and deployment",
                capabilities: &["CI/CD setup", "containerization", "auto-scaling", "monitoring"],
            },
            Self::BusinessSetup => AgentProfile {
                name: "Business Setup",
                description: "Handles business formation and compliance",
                capabilities: &[
                    "company formation",
                    "legal compliance",
                    "trademark filing",
                    "terms of service",
                ],
            },
            Self::ContentMarketing => AgentProfile {
                name: "Content Marketing",
                description: "Creates and distributes content",
                capabilities: &["blog writing", "SEO optimization", "social media", "email campaigns"],
            },
            Self::SalesAutomation => AgentProfile {
                name: "Sales Automation",
                description: "Automates sales outreach and conversion",
                capabilities: &[
                    "lead generation",
                    "email outreach",
                    "demo scheduling",
                    "proposal creation",
                ],
            },
            Self::CustomerSupport => AgentProfile {
                name: "Customer Support",
                description: "24/7 intelligent customer service",
                capabilities: &[
                    "ticket handling",
                    "live chat",
                    "knowledge base",
                    "escalation management",
                ],
            },
            Self::AnalyticsEngine => AgentProfile {
                name: "Analytics Engine",
                description: "Real-time business intelligence",
                capabilities: &["KPI tracking", "predictive analytics", "reporting", "anomaly detection"],
            },
            Self::FinanceManager => AgentProfile {
                name: "Finance Manager",
                description: "Automated accounting and finance",
                capabilities: &["bookkeeping", "invoicing", "expense tracking", "financial forecasting"],
            },
            Self::SystemOptimizer => AgentProfile {
                name: "System Optimizer",
                description: "Continuously optimizes all systems",
                capabilities: &[
                    "performance tuning",
                    "cost optimization",
                    "workflow improvement",
                    "A/B testing",
                ],
            },
        }
    }

    /// Returns the human-readable agent name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        self.profile().name
    }

    /// Builds the default system prompt for this agent from its role and
    /// capability list.
    #[must_use]
    pub fn system_prompt(&self) -> String {
        let profile = self.profile();
        format!(
            "You are an expert {} agent responsible for {}. \
             Perform tasks related to {} with high quality and efficiency.",
            profile.name,
            profile.description,
            profile.capabilities.join(", ")
        )
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

struct StageDefinition {
    name: &'static str,
    agents: &'static [AgentKind],
    policy: CompletionPolicy,
}

/// Stage table, indexed by stage number minus one.
///
/// Stages 1-3 produce artifacts later stages build on, so every agent must
/// succeed. Stages 4-6 are operational fan-out where partial results are
/// still useful.
static STAGES: [StageDefinition; STAGE_COUNT as usize] = [
    StageDefinition {
        name: "Input Processing",
        agents: &[AgentKind::IdeaProcessor, AgentKind::ContextBuilder],
        policy: CompletionPolicy::AllMustSucceed,
    },
    StageDefinition {
        name: "Validation & Strategy",
        agents: &[AgentKind::MarketResearch, AgentKind::TechnicalArchitect],
        policy: CompletionPolicy::AllMustSucceed,
    },
    StageDefinition {
        name: "Development",
        agents: &[
            AgentKind::UiUxDesigner,
            AgentKind::FullStackDev,
            AgentKind::QaSecurity,
            AgentKind::DevOpsPipeline,
        ],
        policy: CompletionPolicy::AllMustSucceed,
    },
    StageDefinition {
        name: "Go-to-Market",
        agents: &[
            AgentKind::BusinessSetup,
            AgentKind::ContentMarketing,
            AgentKind::SalesAutomation,
        ],
        policy: CompletionPolicy::BestEffort,
    },
    StageDefinition {
        name: "Business Operations",
        agents: &[
            AgentKind::CustomerSupport,
            AgentKind::AnalyticsEngine,
            AgentKind::FinanceManager,
        ],
        policy: CompletionPolicy::BestEffort,
    },
    StageDefinition {
        name: "Self-Improvement",
        agents: &[AgentKind::SystemOptimizer],
        policy: CompletionPolicy::BestEffort,
    },
];

/// Pure lookup over the compiled stage table.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageGraph;

impl StageGraph {
    fn definition(stage: u32) -> Result<&'static StageDefinition, OrchestrationError> {
        if (1..=STAGE_COUNT).contains(&stage) {
            Ok(&STAGES[(stage - 1) as usize])
        } else {
            Err(OrchestrationError::UnknownStage(stage))
        }
    }

    /// Returns the agents required by a stage.
    pub fn required_agents(stage: u32) -> Result<&'static [AgentKind], OrchestrationError> {
        Self::definition(stage).map(|d| d.agents)
    }

    /// Returns the completion policy of a stage.
    pub fn completion_policy(stage: u32) -> Result<CompletionPolicy, OrchestrationError> {
        Self::definition(stage).map(|d| d.policy)
    }

    /// Returns the human-readable stage name.
    pub fn stage_name(stage: u32) -> Result<&'static str, OrchestrationError> {
        Self::definition(stage).map(|d| d.name)
    }

    /// Returns the stage following `stage`, or `None` after the last one.
    pub fn next_stage(stage: u32) -> Result<Option<u32>, OrchestrationError> {
        Self::definition(stage)?;
        Ok(if stage < STAGE_COUNT { Some(stage + 1) } else { None })
    }
}
