// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Task-aware model selection for local inference
//!
//! Hardware is bucketed into a VRAM tier, and each tier/task pair maps to a
//! short ranked list of Ollama models. When a daemon is reachable the first
//! ranked model that is already installed wins.

pub mod hardware;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::ollama::OllamaClient;
use crate::{AsmfError, Result};

pub use hardware::{detect_gpu, GpuInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    CodeReview,
    CodeGeneration,
    DocumentAnalysis,
    General,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeReview => "code_review",
            Self::CodeGeneration => "code_generation",
            Self::DocumentAnalysis => "document_analysis",
            Self::General => "general",
        }
    }

    /// "Code Review", "Document Analysis", ...
    pub fn title(&self) -> &'static str {
        match self {
            Self::CodeReview => "Code Review",
            Self::CodeGeneration => "Code Generation",
            Self::DocumentAnalysis => "Document Analysis",
            Self::General => "General",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = AsmfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "code_review" => Ok(Self::CodeReview),
            "code_generation" => Ok(Self::CodeGeneration),
            "document_analysis" => Ok(Self::DocumentAnalysis),
            "general" => Ok(Self::General),
            other => Err(AsmfError::InvalidInput(format!("unknown task type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareTier {
    Low,
    Mid,
    High,
}

impl HardwareTier {
    pub fn for_vram(vram_gb: f64) -> Self {
        if vram_gb >= 12.0 {
            Self::High
        } else if vram_gb >= 8.0 {
            Self::Mid
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRecommendation {
    pub name: &'static str,
    pub size_gb: f64,
    pub quality: &'static str,
    pub speed: &'static str,
    pub description: &'static str,
    pub task_optimized: bool,
}

macro_rules! rec {
    ($name:expr, $size:expr, $quality:expr, $speed:expr, $description:expr, $optimized:expr) => {
        ModelRecommendation {
            name: $name,
            size_gb: $size,
            quality: $quality,
            speed: $speed,
            description: $description,
            task_optimized: $optimized,
        }
    };
}

const LOW_GPU_FAST: &str = "10-20 tok/s (GPU), 2-5 tok/s (CPU)";
const LOW_GPU_SLOW: &str = "5-10 tok/s (GPU), 1-2 tok/s (CPU)";

static HIGH_CODE_REVIEW: [ModelRecommendation; 2] = [
    rec!("qwen2.5-coder:32b", 21.0, "Excellent", "2-5 tok/s", "Best for thorough code review with deep analysis", true),
    rec!("qwen2.5-coder:14b", 9.0, "Very Good", "5-10 tok/s", "Fast alternative for code review", true),
];
static HIGH_CODE_GENERATION: [ModelRecommendation; 2] = [
    rec!("qwen2.5-coder:32b", 21.0, "Excellent", "2-5 tok/s", "Best code generation with strong reasoning", true),
    rec!("qwen2.5-coder:14b", 9.0, "Very Good", "5-10 tok/s", "Balanced code generation", true),
];
static HIGH_DOCUMENT_ANALYSIS: [ModelRecommendation; 2] = [
    rec!("qwen2.5:32b-q4", 20.0, "Excellent", "2-5 tok/s", "Best for complex document understanding", false),
    rec!("qwen2.5:14b-q4", 9.0, "Very Good", "5-10 tok/s", "Good document analysis with faster inference", false),
];
static HIGH_GENERAL: [ModelRecommendation; 2] = [
    rec!("qwen2.5:32b-q4", 20.0, "Excellent", "2-5 tok/s", "Best general-purpose model", false),
    rec!("qwen2.5:14b-q4", 9.0, "Very Good", "5-10 tok/s", "Fast general-purpose alternative", false),
];
static MID_CODE_REVIEW: [ModelRecommendation; 2] = [
    rec!("qwen2.5-coder:14b", 9.0, "Very Good", "5-10 tok/s", "Best code review for mid-range GPUs", true),
    rec!("qwen2.5-coder:7b", 4.5, "Good", "10-15 tok/s", "Faster code review", true),
];
static MID_CODE_GENERATION: [ModelRecommendation; 2] = [
    rec!("qwen2.5-coder:14b", 9.0, "Very Good", "5-10 tok/s", "Good code generation", true),
    rec!("qwen2.5-coder:7b", 4.5, "Good", "10-15 tok/s", "Faster code generation", true),
];
static MID_DOCUMENT_ANALYSIS: [ModelRecommendation; 2] = [
    rec!("qwen2.5:14b-q4", 9.0, "Very Good", "5-10 tok/s", "Good document understanding", false),
    rec!("llama3.2:3b", 2.0, "Good", "10-20 tok/s", "Fast basic analysis", false),
];
static MID_GENERAL: [ModelRecommendation; 2] = [
    rec!("qwen2.5:14b-q4", 9.0, "Very Good", "5-10 tok/s", "Best balance for general use", false),
    rec!("mistral:7b-q4", 4.0, "Good", "8-15 tok/s", "Fast general-purpose", false),
];
static LOW_CODE_REVIEW: [ModelRecommendation; 2] = [
    rec!("qwen2.5-coder:7b", 4.5, "Good", LOW_GPU_SLOW, "Best code review for limited hardware", true),
    rec!("llama3.2:3b", 2.0, "Fair", LOW_GPU_FAST, "Basic code review", false),
];
static LOW_CODE_GENERATION: [ModelRecommendation; 2] = [
    rec!("qwen2.5-coder:7b", 4.5, "Good", LOW_GPU_SLOW, "Decent code generation", true),
    rec!("llama3.2:3b", 2.0, "Fair", LOW_GPU_FAST, "Basic code generation", false),
];
static LOW_DOCUMENT_ANALYSIS: [ModelRecommendation; 2] = [
    rec!("llama3.2:3b", 2.0, "Good", LOW_GPU_FAST, "Best for limited hardware", false),
    rec!("qwen2.5:7b-q4", 4.0, "Good", "5-10 tok/s (GPU), 1-3 tok/s (CPU)", "Better quality, slower", false),
];
static LOW_GENERAL: [ModelRecommendation; 2] = [
    rec!("llama3.2:3b", 2.0, "Good", LOW_GPU_FAST, "Best for limited hardware", false),
    rec!("phi3:mini", 2.0, "Good", "10-15 tok/s", "Efficient Microsoft model", false),
];

/// Ranked recommendations for a tier and task
pub fn recommendations_for(tier: HardwareTier, task: TaskType) -> &'static [ModelRecommendation] {
    use HardwareTier::*;
    use TaskType::*;
    match (tier, task) {
        (High, CodeReview) => &HIGH_CODE_REVIEW,
        (High, CodeGeneration) => &HIGH_CODE_GENERATION,
        (High, DocumentAnalysis) => &HIGH_DOCUMENT_ANALYSIS,
        (High, General) => &HIGH_GENERAL,
        (Mid, CodeReview) => &MID_CODE_REVIEW,
        (Mid, CodeGeneration) => &MID_CODE_GENERATION,
        (Mid, DocumentAnalysis) => &MID_DOCUMENT_ANALYSIS,
        (Mid, General) => &MID_GENERAL,
        (Low, CodeReview) => &LOW_CODE_REVIEW,
        (Low, CodeGeneration) => &LOW_CODE_GENERATION,
        (Low, DocumentAnalysis) => &LOW_DOCUMENT_ANALYSIS,
        (Low, General) => &LOW_GENERAL,
    }
}

/// Chooses an Ollama model for a task given the available VRAM
pub struct ModelSelector {
    pub vram_gb: f64,
    pub has_gpu: bool,
    pub gpu_vendor: Option<String>,
    ollama: Option<OllamaClient>,
}

impl ModelSelector {
    /// Use a known VRAM size instead of probing the hardware
    pub fn with_vram(vram_gb: f64) -> Self {
        Self {
            vram_gb,
            has_gpu: vram_gb > 0.0,
            gpu_vendor: Some("Manual Override".to_string()),
            ollama: None,
        }
    }

    /// Probe the GPU with vendor tools
    pub fn detect() -> Self {
        Self::from_gpu(detect_gpu())
    }

    pub fn from_gpu(gpu: GpuInfo) -> Self {
        info!(
            "ModelSelector initialized: {}GB VRAM, GPU: {} ({})",
            gpu.vram_gb,
            gpu.has_gpu,
            gpu.vendor.as_deref().unwrap_or("none")
        );
        Self {
            vram_gb: gpu.vram_gb,
            has_gpu: gpu.has_gpu,
            gpu_vendor: gpu.vendor,
            ollama: None,
        }
    }

    /// Daemon used to list installed models
    pub fn with_ollama(mut self, client: OllamaClient) -> Self {
        self.ollama = Some(client);
        self
    }

    pub fn tier(&self) -> HardwareTier {
        HardwareTier::for_vram(self.vram_gb)
    }

    pub fn recommendations(&self, task: TaskType) -> &'static [ModelRecommendation] {
        recommendations_for(self.tier(), task)
    }

    /// First recommendation present in `available`, else the top one
    pub fn pick_from(&self, task: TaskType, available: &[String]) -> &'static str {
        let recs = self.recommendations(task);
        if let Some(rec) = recs.iter().find(|r| available.iter().any(|m| m == r.name)) {
            info!(
                "Selected {} for {} (quality: {}, speed: {})",
                rec.name, task, rec.quality, rec.speed
            );
            return rec.name;
        }
        warn!(
            "No recommended models available for {}. Recommend pulling: {}",
            task, recs[0].name
        );
        recs[0].name
    }

    /// Best model for `task`, optionally restricted to installed models
    pub async fn select_model(&self, task: TaskType, check_availability: bool) -> &'static str {
        if !check_availability {
            return self.recommendations(task)[0].name;
        }
        let available = self.list_available_models().await;
        self.pick_from(task, &available)
    }

    async fn list_available_models(&self) -> Vec<String> {
        let Some(client) = &self.ollama else {
            debug!("No Ollama client configured; skipping model listing");
            return Vec::new();
        };
        match client.list_models().await {
            Ok(models) => models,
            Err(e) => {
                debug!("Could not list Ollama models: {}", e);
                Vec::new()
            }
        }
    }

    /// Human-readable recommendation table
    pub fn render_recommendations(&self, task: TaskType) -> String {
        let rule = "=".repeat(70);
        let mut out = format!(
            "\n{rule}\nModel Recommendations for {}\nHardware: {}GB VRAM ({} tier)\n{rule}\n\n",
            task.title(),
            self.vram_gb,
            self.tier().as_str(),
        );
        for (i, rec) in self.recommendations(task).iter().enumerate() {
            let badge = if rec.task_optimized { " [TASK-OPTIMIZED]" } else { "" };
            out.push_str(&format!("{}. {}{}\n", i + 1, rec.name, badge));
            out.push_str(&format!(
                "   Size: {}GB | Quality: {} | Speed: {}\n",
                rec.size_gb, rec.quality, rec.speed
            ));
            out.push_str(&format!("   {}\n\n", rec.description));
        }
        out
    }
}
