use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const USER_AGENT: &str = "Fix-OS/1.0";
const SUGGEST_LIMIT: u32 = 5;

/// Difficulty as displayed to the user, folded down from the guide
/// database's five upstream levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Moderate,
    Difficult,
    #[serde(rename = "Very Difficult")]
    VeryDifficult,
}

impl Difficulty {
    fn from_upstream(label: &str) -> Self {
        match label {
            "Very easy" | "Easy" => Difficulty::Easy,
            "Difficult" => Difficulty::Difficult,
            "Very difficult" => Difficulty::VeryDifficult,
            _ => Difficulty::Moderate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideStep {
    pub step_number: u32,
    pub instruction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairGuide {
    pub title: String,
    pub difficulty: Difficulty,
    pub estimated_time: String,
    pub tools_required: Vec<String>,
    pub parts_required: Vec<String>,
    pub steps: Vec<GuideStep>,
}

/// Outcome of a guide search: either a full guide or no hits at all.
#[derive(Debug, Clone, PartialEq)]
pub enum GuideLookup {
    Found(RepairGuide),
    NoGuides,
}

/// Client for the repair-guide database.
#[derive(Clone)]
pub struct GuideClient {
    client: Client,
    host: String,
}

impl GuideClient {
    pub fn new<H: Into<String>>(host: H) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            host: host.into(),
        })
    }

    /// Search hits for a free-text query, in the database's relevance order.
    pub async fn suggest(&self, query: &str) -> Result<Vec<Value>> {
        let url = format!(
            "{}/api/2.0/suggest/{}",
            self.host.trim_end_matches('/'),
            urlencoding::encode(query)
        );

        let response = self
            .client
            .get(&url)
            .query(&[("doctypes", "guide"), ("limit", &SUGGEST_LIMIT.to_string())])
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("guide search failed: {}", response.status()));
        }

        let body: Value = response.json().await?;
        Ok(body["results"].as_array().cloned().unwrap_or_default())
    }

    /// Search for a guide matching the device and issue, then fetch the top
    /// hit's full detail. No hits is a distinct outcome; a hit whose guide
    /// identifier cannot be extracted fails the lookup.
    pub async fn find_guide(&self, device: &str, issue: &str) -> Result<GuideLookup> {
        let query = format!("{device} {issue}");
        let results = self.suggest(query.trim()).await?;

        let Some(first) = results.first() else {
            return Ok(GuideLookup::NoGuides);
        };

        let guide_id = extract_guide_id(first)
            .ok_or_else(|| anyhow!("could not extract guide id from search results"))?;

        let url = format!(
            "{}/api/2.0/guides/{guide_id}",
            self.host.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("guide fetch failed: {}", response.status()));
        }

        let body: Value = response.json().await?;
        Ok(GuideLookup::Found(map_guide(&body, device, issue)))
    }
}

/// The top hit's guide id, falling back to the last URL path segment.
fn extract_guide_id(hit: &Value) -> Option<String> {
    if let Some(id) = hit["guideid"].as_u64() {
        return Some(id.to_string());
    }
    if let Some(id) = hit["guideid"].as_str() {
        return Some(id.to_string());
    }
    hit["url"]
        .as_str()
        .and_then(|url| url.rsplit('/').next())
        .filter(|segment| !segment.is_empty())
        .map(String::from)
}

fn map_guide(body: &Value, device: &str, issue: &str) -> RepairGuide {
    let steps = body["steps"]
        .as_array()
        .map(|steps| {
            steps
                .iter()
                .enumerate()
                .map(|(index, step)| map_step(step, index))
                .collect()
        })
        .unwrap_or_default();

    RepairGuide {
        title: body["title"]
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| format!("{device} - {issue} Repair Guide")),
        difficulty: Difficulty::from_upstream(body["difficulty"].as_str().unwrap_or_default()),
        estimated_time: body["time_required"]
            .as_str()
            .unwrap_or("30-45 minutes")
            .to_string(),
        tools_required: text_list(&body["tools"]),
        parts_required: text_list(&body["parts"]),
        steps,
    }
}

fn map_step(step: &Value, index: usize) -> GuideStep {
    let instruction = step["lines"]
        .as_array()
        .map(|lines| {
            lines
                .iter()
                .filter_map(|line| line["text_raw"].as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    let image_url = step["media"]["data"][0]["standard"]
        .as_str()
        .or_else(|| step["media"]["data"][0]["original"].as_str())
        .map(String::from);

    GuideStep {
        step_number: step["orderby"].as_u64().unwrap_or(index as u64 + 1) as u32,
        instruction,
        image_url,
        warning: None,
    }
}

fn text_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["text"].as_str())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
