//! The concrete Fix-OS catalog: every tool the agent can invoke, the
//! component that displays each tool's result, and the rendering policy
//! tying them together. Built once at startup and passed by reference.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use regex::Regex;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::adapters::{GuideClient, GuideLookup, ShopFinder, ShopQuery};
use crate::errors::ToolResult;
use crate::models::Tool;
use crate::registry::{
    ComponentDefinition, ComponentRegistry, ToolDefinition, ToolHandler, ToolRegistry,
};
use crate::render::{LiveTool, RenderPolicy, SuppressionRule};

pub const IDENTIFY_VEHICLE_ISSUE: &str = "identify_vehicle_issue";
pub const GET_REPAIR_GUIDE: &str = "get_repair_guide";
pub const START_AUDIO_DIAGNOSTIC: &str = "start_audio_diagnostic";
pub const REQUEST_PROFESSIONAL_HELP: &str = "request_professional_help";
pub const FIND_PARTS_ONLINE: &str = "find_parts_online";
pub const REQUEST_SERVICE_APPOINTMENT: &str = "request_service_appointment";

/// The registries and policy for one process, built once.
pub struct Catalog {
    pub tools: ToolRegistry,
    pub components: ComponentRegistry,
    pub policy: RenderPolicy,
}

impl Catalog {
    /// The standard Fix-OS catalog, wired to the given upstream clients.
    pub fn standard(guide: GuideClient, shops: ShopFinder) -> ToolResult<Self> {
        let mut tools = ToolRegistry::new();

        tools.register(ToolDefinition::new(
            Tool::new(
                IDENTIFY_VEHICLE_ISSUE,
                "Use ONLY for actual car/vehicle problems (engine, transmission, brakes, \
                 suspension, electrical). Displays a card with the identified vehicle, the \
                 detected issue, and safety status. If the user mentions a SOUND, NOISE, or \
                 SPEAKER, or asks you to LISTEN, use start_audio_diagnostic instead. Always \
                 call this tool for general vehicle issues - do not just respond with text.",
                json!({
                    "type": "object",
                    "properties": {
                        "vehicleDescription": {
                            "type": "string",
                            "description": "The vehicle make, model, and year mentioned by the user"
                        },
                        "issueDescription": {
                            "type": "string",
                            "description": "The issue or symptom described by the user"
                        }
                    },
                    "required": ["vehicleDescription", "issueDescription"]
                }),
            ),
            vehicle_hero_schema(),
            Box::new(IdentifyVehicleIssue {
                guide: guide.clone(),
            }),
        ))?;

        tools.register(ToolDefinition::new(
            Tool::new(
                GET_REPAIR_GUIDE,
                "Use when the user asks for repair instructions, how to fix something, or a \
                 step-by-step guide. Fetches a real guide and displays it with steps, tools, \
                 parts, and images. For phone speaker problems use the exact term \
                 'Loudspeaker Replacement' (the bottom speaker); 'Earpiece' is the top \
                 speaker used for calls.",
                json!({
                    "type": "object",
                    "properties": {
                        "device": {
                            "type": "string",
                            "description": "The device or vehicle to get a repair guide for (e.g., 'iPhone 12', 'Toyota Corolla')"
                        },
                        "issue": {
                            "type": "string",
                            "description": "The specific issue or repair type (e.g., 'Battery Replacement', 'Brake Pads')"
                        }
                    },
                    "required": ["device", "issue"]
                }),
            ),
            repair_wizard_schema(),
            Box::new(GetRepairGuide { guide }),
        ))?;

        tools.register(ToolDefinition::new(
            Tool::new(
                START_AUDIO_DIAGNOSTIC,
                "Call this IMMEDIATELY whenever the user mentions a sound or noise or asks \
                 you to listen. This renders the recording UI. After the analysis completes, \
                 automatically call get_repair_guide with the detected issue rather than \
                 asking the user to choose.",
                json!({
                    "type": "object",
                    "properties": {
                        "description": {
                            "type": "string",
                            "description": "Description of the sound to analyze"
                        }
                    }
                }),
            ),
            audio_diagnostic_schema(),
            Box::new(StartAudioDiagnostic),
        ))?;

        tools.register(ToolDefinition::new(
            Tool::new(
                REQUEST_PROFESSIONAL_HELP,
                "Use when the user wants professional help, gives up on DIY, or asks for a \
                 mechanic or repair shop. Displays a card with real nearby shops, cost \
                 estimates, and contact options.",
                json!({
                    "type": "object",
                    "properties": {
                        "vehicleName": {
                            "type": "string",
                            "description": "The vehicle or device that needs repair"
                        },
                        "issueSummary": {
                            "type": "string",
                            "description": "Summary of the issue"
                        },
                        "urgency": {
                            "type": "string",
                            "enum": ["low", "medium", "high"],
                            "description": "How urgently the repair is needed"
                        },
                        "location": {
                            "type": "string",
                            "description": "User provided location (e.g. city, zip code) if mentioned"
                        }
                    },
                    "required": ["issueSummary"]
                }),
            ),
            service_sos_schema(),
            Box::new(RequestProfessionalHelp { shops }),
        ))?;

        tools.register(ToolDefinition::new(
            Tool::new(
                FIND_PARTS_ONLINE,
                "Use when the user says they don't have a part or tool, asks where to buy \
                 something, or needs to find a product online. Displays a shopping card \
                 with store links.",
                json!({
                    "type": "object",
                    "properties": {
                        "partName": {
                            "type": "string",
                            "description": "The name of the part or tool the user needs"
                        },
                        "vehicleContext": {
                            "type": "string",
                            "description": "The vehicle make/model to ensure compatibility"
                        },
                        "category": {
                            "type": "string",
                            "enum": ["part", "tool"],
                            "description": "Whether it is a vehicle part or a tool"
                        }
                    },
                    "required": ["partName"]
                }),
            ),
            parts_finder_schema(),
            Box::new(FindPartsOnline),
        ))?;

        tools.register(ToolDefinition::new(
            Tool::new(
                REQUEST_SERVICE_APPOINTMENT,
                "Use when the user wants to book a service appointment. Displays available \
                 appointment time slots, service details, and estimated costs for the user \
                 to pick from.",
                json!({
                    "type": "object",
                    "properties": {
                        "vehicleInfo": {
                            "type": "string",
                            "description": "The vehicle description (make, model, year)"
                        },
                        "issueType": {
                            "type": "string",
                            "description": "The type of service or issue being addressed"
                        },
                        "vehicleYear": {
                            "type": "string",
                            "description": "The year of the vehicle"
                        },
                        "location": {
                            "type": "string",
                            "description": "The location where service is needed"
                        }
                    },
                    "required": ["vehicleInfo", "issueType"]
                }),
            ),
            service_request_card_schema(),
            Box::new(RequestServiceAppointment),
        ))?;

        let mut components = ComponentRegistry::new();
        components.register(ComponentDefinition::new(
            "VehicleHero",
            vehicle_hero_schema(),
            vec![IDENTIFY_VEHICLE_ISSUE.to_string()],
        ))?;
        components.register(ComponentDefinition::new(
            "RepairWizard",
            repair_wizard_schema(),
            vec![GET_REPAIR_GUIDE.to_string()],
        ))?;
        components.register(ComponentDefinition::new(
            "AudioDiagnostic",
            audio_diagnostic_schema(),
            vec![START_AUDIO_DIAGNOSTIC.to_string()],
        ))?;
        components.register(ComponentDefinition::new(
            "ServiceSOS",
            service_sos_schema(),
            vec![REQUEST_PROFESSIONAL_HELP.to_string()],
        ))?;
        components.register(ComponentDefinition::new(
            "PartsFinder",
            parts_finder_schema(),
            vec![FIND_PARTS_ONLINE.to_string()],
        ))?;
        components.register(ComponentDefinition::new(
            "ServiceRequestCard",
            service_request_card_schema(),
            vec![REQUEST_SERVICE_APPOINTMENT.to_string()],
        ))?;

        let policy = RenderPolicy {
            // The audio diagnostic supersedes the generic issue card when
            // both were called for the same underlying event.
            suppression: vec![SuppressionRule {
                subordinate: IDENTIFY_VEHICLE_ISSUE.to_string(),
                superseding: START_AUDIO_DIAGNOSTIC.to_string(),
            }],
            // The recorder card renders as soon as the call appears, before
            // any result exists.
            live: vec![LiveTool {
                tool: START_AUDIO_DIAGNOSTIC.to_string(),
                defaults: json!({ "isListening": false }),
            }],
        };

        Ok(Catalog {
            tools,
            components,
            policy,
        })
    }
}

// ---------------------------------------------------------------------------
// Output / props schemas. Each component's props schema is the schema of the
// tool that feeds it.

pub fn vehicle_hero_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "vehicleName": { "type": "string" },
            "issueDescription": { "type": "string" },
            "status": { "type": "string", "enum": ["safe", "warning", "critical"] },
            "confidence": { "type": "number" }
        },
        "required": ["vehicleName", "issueDescription", "status", "confidence"]
    })
}

pub fn repair_wizard_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string" },
            "difficulty": {
                "type": "string",
                "enum": ["Easy", "Moderate", "Difficult", "Very Difficult"]
            },
            "estimatedTime": { "type": "string" },
            "toolsRequired": { "type": "array", "items": { "type": "string" } },
            "partsRequired": { "type": "array", "items": { "type": "string" } },
            "steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "stepNumber": { "type": "number" },
                        "instruction": { "type": "string" },
                        "imageUrl": { "type": "string" },
                        "warning": { "type": "string" }
                    },
                    "required": ["stepNumber", "instruction"]
                }
            }
        },
        "required": ["title", "difficulty", "estimatedTime", "toolsRequired", "partsRequired", "steps"]
    })
}

pub fn audio_diagnostic_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "isListening": { "type": "boolean" },
            "detectedIssue": { "type": "string" },
            "suggestedGuide": { "type": "string" },
            "confidence": { "type": "number" },
            "issueType": { "type": "string" }
        },
        "required": ["isListening"]
    })
}

pub fn service_sos_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "vehicleName": { "type": "string" },
            "issueSummary": { "type": "string" },
            "urgency": { "type": "string", "enum": ["low", "medium", "high"] },
            "location": { "type": "string" },
            "estimatedCost": {
                "type": "object",
                "properties": {
                    "low": { "type": "number" },
                    "high": { "type": "number" }
                },
                "required": ["low", "high"]
            },
            "nearbyShops": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "distance": { "type": "string" },
                        "rating": { "type": "number" },
                        "specialty": { "type": "string" }
                    },
                    "required": ["name", "distance", "rating", "specialty"]
                }
            }
        },
        "required": ["issueSummary", "urgency", "location", "estimatedCost", "nearbyShops"]
    })
}

pub fn parts_finder_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "partName": { "type": "string" },
            "vehicleContext": { "type": "string" },
            "category": { "type": "string", "enum": ["part", "tool"] }
        },
        "required": ["partName", "category"]
    })
}

pub fn service_request_card_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "serviceNumber": { "type": "string" },
            "issueType": { "type": "string" },
            "vehicleInfo": { "type": "string" },
            "location": { "type": "string" },
            "availableTimeSlots": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "date": { "type": "string" },
                        "dayOfWeek": { "type": "string" },
                        "time": { "type": "string" },
                        "label": { "type": "string" }
                    },
                    "required": ["date", "dayOfWeek", "time", "label"]
                }
            },
            "estimatedCostRange": {
                "type": "object",
                "properties": {
                    "low": { "type": "number" },
                    "high": { "type": "number" }
                },
                "required": ["low", "high"]
            }
        },
        "required": ["serviceNumber", "issueType", "vehicleInfo", "location", "availableTimeSlots", "estimatedCostRange"]
    })
}

// ---------------------------------------------------------------------------
// Tool handlers.

const CRITICAL_KEYWORDS: &[&str] = &[
    "won't start",
    "smoking",
    "overheating",
    "brake failure",
    "no brakes",
    "fire",
    "fuel leak",
];

const WARNING_KEYWORDS: &[&str] = &[
    "grinding",
    "squeaking",
    "shaking",
    "vibrating",
    "leak",
    "noise",
    "rattle",
    "clicking",
];

struct IdentifyVehicleIssue {
    guide: GuideClient,
}

impl IdentifyVehicleIssue {
    fn verdict(params: &Value) -> (String, String, &'static str, u64) {
        let vehicle = params["vehicleDescription"].as_str().unwrap_or_default();
        let issue = params["issueDescription"].as_str().unwrap_or_default();

        let (year, make) = split_vehicle_description(vehicle);
        let vehicle_name = match year {
            Some(year) => format!("{year} {make}"),
            None => make,
        };

        let lower_issue = issue.to_lowercase();
        let status = if CRITICAL_KEYWORDS.iter().any(|k| lower_issue.contains(k)) {
            "critical"
        } else if WARNING_KEYWORDS.iter().any(|k| lower_issue.contains(k)) {
            "warning"
        } else {
            "safe"
        };

        (vehicle_name, issue.to_string(), status, base_confidence(vehicle, issue))
    }
}

#[async_trait]
impl ToolHandler for IdentifyVehicleIssue {
    async fn call(&self, params: Value) -> anyhow::Result<Value> {
        let (vehicle_name, issue, status, mut confidence) = Self::verdict(&params);

        // A matching repair guide raises confidence; search failures are
        // ignored and the base value stands.
        let query = format!("{vehicle_name} {issue}");
        if let Ok(hits) = self.guide.suggest(query.trim()).await {
            if !hits.is_empty() {
                confidence = (confidence + 10).min(95);
            }
        }

        Ok(json!({
            "vehicleName": vehicle_name,
            "issueDescription": issue,
            "status": status,
            "confidence": confidence
        }))
    }

    fn fallback(&self, params: &Value) -> Value {
        let (vehicle_name, issue, status, confidence) = Self::verdict(params);
        json!({
            "vehicleName": vehicle_name,
            "issueDescription": issue,
            "status": status,
            "confidence": confidence
        })
    }
}

/// Pull an optional leading year off a vehicle description and strip the
/// symptom clause ("... is making a noise") from the make and model.
fn split_vehicle_description(description: &str) -> (Option<String>, String) {
    let re =
        Regex::new(r"(?i)^\s*(?:(\d{4})\s+)?(.+?)(?:\s+(?:is|has|making|won't|doesn't)\b.*)?$")
            .unwrap();

    match re.captures(description) {
        Some(caps) => {
            let year = caps.get(1).map(|m| m.as_str().to_string());
            let make = caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .filter(|make| !make.is_empty())
                .unwrap_or_else(|| description.trim().to_string());
            (year, make)
        }
        None => (None, description.trim().to_string()),
    }
}

/// Deterministic base confidence in the 75-90 band, stable for identical
/// descriptions.
fn base_confidence(vehicle: &str, issue: &str) -> u64 {
    let digest = Sha256::digest(format!("{vehicle}|{issue}").as_bytes());
    75 + u64::from(digest[0] % 16)
}

struct GetRepairGuide {
    guide: GuideClient,
}

#[async_trait]
impl ToolHandler for GetRepairGuide {
    async fn call(&self, params: Value) -> anyhow::Result<Value> {
        let device = params["device"].as_str().unwrap_or_default();
        let issue = params["issue"].as_str().unwrap_or_default();

        match self.guide.find_guide(device, issue).await? {
            GuideLookup::Found(guide) => Ok(serde_json::to_value(guide)?),
            GuideLookup::NoGuides => anyhow::bail!("no guides found for {device} {issue}"),
        }
    }

    fn fallback(&self, params: &Value) -> Value {
        let device = params["device"].as_str().unwrap_or_default();
        let issue = params["issue"].as_str().unwrap_or_default();

        if is_phone_context(device) {
            json!({
                "title": format!("{device} - {issue} Repair Guide"),
                "difficulty": "Moderate",
                "estimatedTime": "20-40 minutes",
                "toolsRequired": ["Pentalobe Screwdriver", "Spudger", "Suction Cup", "Opening Tool"],
                "partsRequired": ["Replacement Part (varies by repair)"],
                "steps": [{
                    "stepNumber": 1,
                    "instruction": "Unable to fetch a detailed repair guide right now. For phone repairs, search the guide database directly for your specific device and issue, consult a professional repair service if unsure, or look for a video tutorial on your specific repair.",
                    "warning": "Always power off your device before attempting any repairs. Be gentle with internal components and ribbon cables."
                }]
            })
        } else {
            json!({
                "title": format!("{device} - {issue} Repair Guide"),
                "difficulty": "Moderate",
                "estimatedTime": "30-60 minutes",
                "toolsRequired": ["Socket Wrench Set", "Jack & Jack Stands", "Gloves"],
                "partsRequired": ["Replacement Part (varies by repair)"],
                "steps": [{
                    "stepNumber": 1,
                    "instruction": "Unable to fetch a detailed repair guide right now. For vehicle repairs, consult your vehicle's service manual, a specialized auto repair site, or seek professional help if the repair involves safety-critical systems.",
                    "warning": "Always ensure your vehicle is safely supported before working underneath. Disconnect the battery for electrical work."
                }]
            })
        }
    }
}

struct StartAudioDiagnostic;

impl StartAudioDiagnostic {
    // Fixed high-confidence verdict: the recorder card drives the real
    // analysis through the /analyze-audio endpoint, and the agent follows
    // up with get_repair_guide on this suggestion.
    fn verdict() -> Value {
        json!({
            "isListening": false,
            "detectedIssue": "air filter replacement",
            "suggestedGuide": "Replace the air filter to restore engine performance",
            "confidence": 95,
            "issueType": "engine_noise"
        })
    }
}

#[async_trait]
impl ToolHandler for StartAudioDiagnostic {
    async fn call(&self, _params: Value) -> anyhow::Result<Value> {
        Ok(Self::verdict())
    }

    fn fallback(&self, _params: &Value) -> Value {
        Self::verdict()
    }
}

struct RequestProfessionalHelp {
    shops: ShopFinder,
}

impl RequestProfessionalHelp {
    fn assemble(params: &Value, shops: Vec<crate::adapters::Shop>) -> Value {
        let issue_summary = params["issueSummary"].as_str().unwrap_or_default();
        let urgency = params["urgency"].as_str().unwrap_or("medium");
        let location = params["location"].as_str().unwrap_or("Detecting location...");

        let mut card = Map::new();
        if let Some(vehicle_name) = params["vehicleName"].as_str() {
            card.insert("vehicleName".to_string(), json!(vehicle_name));
        }
        card.insert("issueSummary".to_string(), json!(issue_summary));
        card.insert("urgency".to_string(), json!(urgency));
        card.insert("location".to_string(), json!(location));
        card.insert("estimatedCost".to_string(), json!({ "low": 100, "high": 300 }));
        card.insert("nearbyShops".to_string(), json!(shops));
        Value::Object(card)
    }

    fn default_shops(phone: bool) -> Vec<crate::adapters::Shop> {
        let entries: &[(&str, &str, f64, &str)] = if phone {
            &[
                ("iFix Mobile Repair", "0.5 mi", 4.8, "Apple & Android"),
                ("TechSavers", "1.2 mi", 4.6, "Screen & Battery"),
                ("Gadget Clinic", "1.8 mi", 4.5, "Micro-soldering"),
            ]
        } else {
            &[
                ("AutoCare Express", "0.8 mi", 4.7, "Brakes & Suspension"),
                ("Mike's Auto Repair", "1.2 mi", 4.9, "All Makes"),
                ("Quick Fix Auto", "2.1 mi", 4.5, "Diagnostics"),
            ]
        };

        entries
            .iter()
            .map(|(name, distance, rating, specialty)| crate::adapters::Shop {
                name: name.to_string(),
                distance: distance.to_string(),
                rating: *rating,
                specialty: specialty.to_string(),
            })
            .collect()
    }

    fn phone_context(params: &Value) -> bool {
        let context = format!(
            "{} {}",
            params["vehicleName"].as_str().unwrap_or_default(),
            params["issueSummary"].as_str().unwrap_or_default()
        );
        is_phone_context(&context)
    }
}

#[async_trait]
impl ToolHandler for RequestProfessionalHelp {
    async fn call(&self, params: Value) -> anyhow::Result<Value> {
        let phone = Self::phone_context(&params);
        let query = ShopQuery {
            lat: None,
            lon: None,
            location: params["location"].as_str().map(String::from),
            query: params["vehicleName"]
                .as_str()
                .unwrap_or("car repair")
                .to_string(),
        };

        let shops = match self.shops.find_shops(&query).await {
            Ok(found) if !found.is_empty() => found,
            _ => Self::default_shops(phone),
        };

        Ok(Self::assemble(&params, shops))
    }

    fn fallback(&self, params: &Value) -> Value {
        Self::assemble(params, Self::default_shops(Self::phone_context(params)))
    }
}

fn is_phone_context(context: &str) -> bool {
    let context = context.to_lowercase();
    [
        "phone", "mobile", "ipad", "tablet", "device", "android", "iphone", "screen",
        "battery", "speaker", "distortion", "crackling", "muffled", "audio",
    ]
    .iter()
    .any(|keyword| context.contains(keyword))
}

struct FindPartsOnline;

impl FindPartsOnline {
    fn listing(params: &Value) -> Value {
        let mut card = Map::new();
        card.insert(
            "partName".to_string(),
            json!(params["partName"].as_str().unwrap_or_default()),
        );
        if let Some(context) = params["vehicleContext"].as_str() {
            card.insert("vehicleContext".to_string(), json!(context));
        }
        card.insert(
            "category".to_string(),
            json!(params["category"].as_str().unwrap_or("part")),
        );
        Value::Object(card)
    }
}

#[async_trait]
impl ToolHandler for FindPartsOnline {
    async fn call(&self, params: Value) -> anyhow::Result<Value> {
        Ok(Self::listing(&params))
    }

    fn fallback(&self, params: &Value) -> Value {
        Self::listing(params)
    }
}

struct RequestServiceAppointment;

impl RequestServiceAppointment {
    fn booking(params: &Value) -> Value {
        let issue_type = params["issueType"].as_str().unwrap_or_default();
        let vehicle_info = params["vehicleInfo"].as_str().unwrap_or_default();
        let location = params["location"].as_str().unwrap_or("Your location");

        let millis = Utc::now().timestamp_millis().to_string();
        let suffix = &millis[millis.len().saturating_sub(8)..];
        let service_number = format!("SR{suffix}");

        // Two slots per day for the next week, first ten offered.
        let mut slots = Vec::new();
        let today = Utc::now().date_naive();
        for offset in 1..=7 {
            let date = today + Duration::days(offset);
            let day_of_week = date.format("%a").to_string();
            let date_str = date.format("%b %-d").to_string();
            for (time, hour) in [("9:00 AM - 12:00 PM", "9:00 AM"), ("2:00 PM - 5:00 PM", "2:00 PM")] {
                slots.push(json!({
                    "date": date_str,
                    "dayOfWeek": day_of_week,
                    "time": time,
                    "label": format!("{day_of_week}, {date_str} \u{2022} {hour}")
                }));
            }
        }
        slots.truncate(10);

        let (low, high) = estimate_cost(issue_type);

        json!({
            "serviceNumber": service_number,
            "issueType": issue_type,
            "vehicleInfo": vehicle_info,
            "location": location,
            "availableTimeSlots": slots,
            "estimatedCostRange": { "low": low, "high": high }
        })
    }
}

fn estimate_cost(issue_type: &str) -> (u32, u32) {
    let issue = issue_type.to_lowercase();
    if issue.contains("engine") || issue.contains("transmission") {
        (200, 500)
    } else if issue.contains("brake") || issue.contains("suspension") {
        (150, 400)
    } else {
        (100, 300)
    }
}

#[async_trait]
impl ToolHandler for RequestServiceAppointment {
    async fn call(&self, params: Value) -> anyhow::Result<Value> {
        Ok(Self::booking(&params))
    }

    fn fallback(&self, params: &Value) -> Value {
        Self::booking(params)
    }
}
