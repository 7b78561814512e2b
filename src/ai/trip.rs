// src/ai/trip.rs - Post-meal exercise plan generator (intent -> plan)

use crate::ai::client::{extract_json_object, AiClient, CallType};
use crate::mets::MetsService;
use crate::models::{ExerciseIntent, GeneratedPlan, GeoPoint, PlanItemData};
use chrono::{Duration, Local, NaiveDate, NaiveTime, Timelike};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Cities recognized directly in query text
const CITY_KEYWORDS: [&str; 20] = [
    "北京", "上海", "广州", "深圳", "杭州", "成都", "武汉", "西安", "南京", "重庆",
    "天津", "苏州", "长沙", "郑州", "东莞", "青岛", "沈阳", "宁波", "昆明", "大连",
];

/// Suffixes that mark an explicit exercise venue inside a query
const PLACE_KEYWORDS: [&str; 13] = [
    "公园", "步道", "健身房", "体育中心", "运动中心", "健身广场", "跑步道",
    "骑行道", "自行车道", "绿道", "体育场", "运动场", "健身步道",
];

/// Tokens never allowed in a place name
const FORBIDDEN_TOKENS: [&str; 10] = [
    "附近", "示例", "测试", "随机", "XX", "虚构", "虚空", "unknown", "N/A", "位置",
];

/// Sentinel dates a model sometimes copies from prompt examples
const SENTINEL_DATES: [&str; 2] = ["2026-01-27", "1970-01-01"];

const FALLBACK_PLACE: &str = "运动场所";
const MAX_PLACE_NAME_CHARS: usize = 30;
const DEFAULT_CALORIES_TARGET: i64 = 200;

/// Coarse bounding boxes for reverse lookup of the supported cities.
/// Good enough to prefix venue names; exact geocoding is not in scope.
const CITY_BOUNDS: [(&str, f64, f64, f64, f64); 10] = [
    ("北京", 39.4, 41.1, 115.4, 117.5),
    ("上海", 30.7, 31.9, 120.9, 122.0),
    ("广州", 22.5, 23.9, 112.9, 114.1),
    ("深圳", 22.4, 22.9, 113.7, 114.7),
    ("杭州", 29.8, 30.6, 118.3, 120.7),
    ("成都", 30.1, 31.4, 102.9, 104.9),
    ("武汉", 29.9, 31.4, 113.7, 115.1),
    ("西安", 33.7, 34.8, 107.6, 109.8),
    ("南京", 31.2, 32.6, 118.3, 119.2),
    ("重庆", 28.1, 32.2, 105.2, 110.2),
];

pub struct ExplicitPlace {
    pub city: Option<String>,
    pub place_name: String,
}

/// Two-stage LLM plan generator with deterministic post-processing.
/// On any model failure a default walking/running plan is produced.
pub struct TripPlanner {
    client: Arc<AiClient>,
    mets: Arc<MetsService>,
}

impl TripPlanner {
    pub fn new(client: Arc<AiClient>, mets: Arc<MetsService>) -> Self {
        Self { client, mets }
    }

    pub async fn generate(
        &self,
        user_id: i64,
        query: &str,
        preferences: Option<&Value>,
        calories_intake: f64,
        user_location: Option<GeoPoint>,
        weight_kg: Option<f64>,
    ) -> GeneratedPlan {
        let intent = self
            .extract_intent(user_id, query, calories_intake, user_location)
            .await;
        let mut plan = self
            .expand_plan(user_id, query, &intent, preferences, calories_intake, user_location)
            .await;

        let city = detect_city(query)
            .map(|c| c.to_string())
            .or_else(|| city_from_destination(&intent.destination))
            .or_else(|| user_location.and_then(|loc| reverse_geocode_city(loc).map(|c| c.to_string())));

        ensure_specific_locations(&mut plan, city.as_deref());
        ensure_location_diversity(&mut plan.items, city.as_deref());
        adjust_plan_times(&mut plan.items, query, &plan.start_date);
        self.mets.enrich_plan_items(&mut plan.items, weight_kg);
        plan
    }

    /// Stage 1: extract the normalized exercise intent from the query
    pub async fn extract_intent(
        &self,
        user_id: i64,
        query: &str,
        calories_intake: f64,
        user_location: Option<GeoPoint>,
    ) -> ExerciseIntent {
        let today = Local::now().date_naive();
        let prompt = build_intent_prompt(query, calories_intake, user_location, today);

        let raw = self
            .client
            .generate_text(CallType::ExerciseIntent, Some(user_id), query, prompt)
            .await;

        match raw.ok().and_then(|content| {
            extract_json_object(&content).and_then(|s| serde_json::from_str::<Value>(s).ok())
        }) {
            Some(data) => normalize_intent(data, query, calories_intake, today),
            None => {
                warn!("Exercise intent extraction failed, using default intent");
                default_intent(calories_intake, user_location.is_some(), today)
            }
        }
    }

    /// Stage 2: expand the intent into a concrete item-level plan
    async fn expand_plan(
        &self,
        user_id: i64,
        query: &str,
        intent: &ExerciseIntent,
        preferences: Option<&Value>,
        calories_intake: f64,
        user_location: Option<GeoPoint>,
    ) -> GeneratedPlan {
        let prompt = build_plan_prompt(query, intent, preferences, calories_intake, user_location);
        let raw = self
            .client
            .generate_text(
                CallType::TripGeneration,
                Some(user_id),
                &truncate_query(query, 200),
                prompt,
            )
            .await;

        match raw.ok().and_then(|content| {
            extract_json_object(&content)
                .and_then(|s| serde_json::from_str::<GeneratedPlan>(s).ok())
        }) {
            Some(mut plan) => {
                if plan.travelers.is_empty() {
                    plan.travelers = vec!["本人".to_string()];
                }
                if plan.start_date.is_empty() {
                    plan.start_date = intent.start_date.clone();
                }
                if plan.end_date.is_empty() {
                    plan.end_date = intent.end_date.clone();
                }
                plan
            }
            None => {
                warn!("Exercise plan generation failed, using default plan");
                default_plan(intent)
            }
        }
    }
}

fn truncate_query(query: &str, max_chars: usize) -> String {
    query.chars().take(max_chars).collect()
}

pub fn detect_city(text: &str) -> Option<&'static str> {
    CITY_KEYWORDS.iter().find(|city| text.contains(*city)).copied()
}

fn city_from_destination(destination: &str) -> Option<String> {
    detect_city(destination).map(|c| c.to_string())
}

/// Coarse lat/lon -> city lookup over the supported city list
pub fn reverse_geocode_city(location: GeoPoint) -> Option<&'static str> {
    CITY_BOUNDS
        .iter()
        .find(|(_, lat_min, lat_max, lon_min, lon_max)| {
            location.latitude >= *lat_min
                && location.latitude <= *lat_max
                && location.longitude >= *lon_min
                && location.longitude <= *lon_max
        })
        .map(|(city, ..)| *city)
}

/// Heuristic extraction of an explicit venue named in the query
pub fn extract_explicit_place(query: &str) -> Option<ExplicitPlace> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    let city = detect_city(query).map(|c| c.to_string());

    let chars: Vec<char> = query.chars().collect();
    let mut place = None;
    for keyword in PLACE_KEYWORDS {
        let keyword_chars: Vec<char> = keyword.chars().collect();
        if let Some(pos) = find_subsequence(&chars, &keyword_chars) {
            let start = pos.saturating_sub(8);
            let end = pos + keyword_chars.len();
            let mut candidate: String = chars[start..end].iter().collect();
            for filler in ["去", "在", "到", "吧"] {
                candidate = candidate.replace(filler, "");
            }
            let candidate = candidate.trim().to_string();
            if !candidate.is_empty() {
                place = Some(candidate);
                break;
            }
        }
    }

    if place.is_some() || city.is_some() {
        Some(ExplicitPlace {
            city,
            place_name: place.unwrap_or_default(),
        })
    } else {
        None
    }
}

fn find_subsequence(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()] == *needle)
}

/// Strip vague/forbidden tokens, apply the city prefix, and cap length.
/// An emptied name falls back to the generic venue literal.
pub fn sanitize_place_name(name: &str, city_prefix: Option<&str>) -> String {
    let mut name = name.trim().to_string();
    for token in FORBIDDEN_TOKENS {
        name = name.replace(token, "");
    }
    let mut name = name.trim().to_string();
    if name.is_empty() {
        name = FALLBACK_PLACE.to_string();
    }
    if let Some(city) = city_prefix {
        if !name.contains(city) {
            name = format!("{city}{name}");
        }
    }
    if name.chars().count() > MAX_PLACE_NAME_CHARS {
        name = name.chars().take(MAX_PLACE_NAME_CHARS).collect();
    }
    name
}

fn build_intent_prompt(
    query: &str,
    calories_intake: f64,
    user_location: Option<GeoPoint>,
    today: NaiveDate,
) -> String {
    let today_str = today.format("%Y-%m-%d");
    let calories_info = if calories_intake > 0.0 {
        format!("\n用户今日已摄入卡路里：{calories_intake:.1} kcal")
    } else {
        String::new()
    };

    let explicit_hint = match extract_explicit_place(query) {
        Some(place) if !place.place_name.is_empty() => format!(
            "\n用户查询包含明确地点/地址：{}{}\n重要：如果查询中提供了明确地点/地址，destination必须优先使用该地点或与其同一城市的具体真实地点，不要使用模糊名称。",
            place.city.as_deref().unwrap_or(""),
            place.place_name
        ),
        _ => String::new(),
    };

    let location_hint = if let Some(city) = detect_city(query) {
        format!(
            "\n用户查询中明确提到了城市：{city}\n请根据该城市在destination字段中生成具体的地点名称（如\"{city}中央公园\"、\"{city}滨江健身步道\"），不要使用\"附近\"这样的模糊描述。"
        )
    } else if let Some(location) = user_location {
        match reverse_geocode_city(location) {
            Some(city) => format!(
                "\n用户GPS位置位于{city}（纬度 {:.6}, 经度 {:.6}）\n请结合该城市在destination字段中生成具体的地点名称，并包含城市信息，不要使用\"附近\"这样的模糊描述。",
                location.latitude, location.longitude
            ),
            None => format!(
                "\n用户GPS位置：纬度 {:.6}, 经度 {:.6}\n请生成具体的运动地点名称，不要使用\"附近\"这样的模糊描述。",
                location.latitude, location.longitude
            ),
        }
    } else {
        String::new()
    };

    format!(
        r#"请从以下用户查询中提取餐后运动规划的关键信息，并以JSON格式返回。

用户查询："{query}"
{calories_info}{explicit_hint}{location_hint}

系统当前日期：{today_str}

要求提取的信息：
1. destination: 运动区域/起点（必须是具体的地点名称，不要使用"附近"等模糊描述）
2. startDate: 运动开始日期（YYYY-MM-DD格式；"今天"用今天日期，"明天"用明天日期，"周末"取最近的周六，未指定用今天）
3. endDate: 运动结束日期（YYYY-MM-DD格式；"周末"通常指周六周日两天，"三天"为startDate之后2天，未指定多天时与startDate相同）
4. days: 运动天数（整数；"周末"为2，"一周"为7，未指定为1）
5. calories_target: 目标消耗卡路里（整数kcal，未指定时根据已摄入卡路里推算）
6. exercise_type: 运动类型偏好（如"散步"、"跑步"、"骑行"，未指定为null）

只返回JSON，不要其他解释。

严格禁止抄写任何示例值（尤其是日期）。startDate/endDate 必须根据用户查询或当前系统日期 {today_str} 计算。"#
    )
}

/// Post-process the raw intent JSON: fix sentinel/missing dates, derive
/// days and end date, fill the calorie target, and concretize vague
/// destinations.
fn normalize_intent(
    data: Value,
    query: &str,
    calories_intake: f64,
    today: NaiveDate,
) -> ExerciseIntent {
    let str_field = |key: &str| -> Option<String> {
        data.get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && s != "null")
    };

    let mut start_date = str_field("startDate")
        .filter(|d| !SENTINEL_DATES.contains(&d.as_str()))
        .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
        .unwrap_or(today);
    if start_date < today - Duration::days(365) {
        start_date = today;
    }
    let end_date = str_field("endDate")
        .filter(|d| !SENTINEL_DATES.contains(&d.as_str()))
        .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok());

    let mut days = data
        .get("days")
        .and_then(|v| v.as_i64())
        .filter(|d| *d > 0)
        .unwrap_or(1);

    // endDate and days are reconciled: both present -> days wins from the
    // actual span; one present -> the other is derived.
    let end_date = match end_date {
        Some(end) if end >= start_date => {
            days = (end - start_date).num_days() + 1;
            end
        }
        _ => start_date + Duration::days(days - 1),
    };

    let calories_target = data
        .get("calories_target")
        .and_then(|v| v.as_i64())
        .filter(|c| *c > 0)
        .unwrap_or_else(|| {
            if calories_intake > 0.0 {
                (calories_intake * 0.4) as i64
            } else {
                DEFAULT_CALORIES_TARGET
            }
        });

    let mut destination = str_field("destination").unwrap_or_default();
    if destination.contains("附近") {
        // Keep any concrete remainder after stripping the vague token
        destination = destination.replace("附近", "").trim().to_string();
        if destination.is_empty() {
            destination = FALLBACK_PLACE.to_string();
        }
    }
    if destination.is_empty() {
        destination = FALLBACK_PLACE.to_string();
    }
    if let Some(place) = extract_explicit_place(query) {
        if !place.place_name.is_empty() {
            destination = sanitize_place_name(&place.place_name, place.city.as_deref());
        }
    }

    ExerciseIntent {
        destination,
        start_date: start_date.format("%Y-%m-%d").to_string(),
        end_date: end_date.format("%Y-%m-%d").to_string(),
        days,
        calories_target,
        exercise_type: str_field("exercise_type"),
    }
}

fn default_intent(calories_intake: f64, has_location: bool, today: NaiveDate) -> ExerciseIntent {
    let calories_target = if calories_intake > 0.0 {
        (calories_intake * 0.4) as i64
    } else {
        DEFAULT_CALORIES_TARGET
    };
    let today_str = today.format("%Y-%m-%d").to_string();
    ExerciseIntent {
        destination: if has_location {
            "当前位置附近".to_string()
        } else {
            "附近".to_string()
        },
        start_date: today_str.clone(),
        end_date: today_str,
        days: 1,
        calories_target,
        exercise_type: None,
    }
}

fn build_plan_prompt(
    query: &str,
    intent: &ExerciseIntent,
    preferences: Option<&Value>,
    calories_intake: f64,
    user_location: Option<GeoPoint>,
) -> String {
    let mut preference_text = String::new();
    if let Some(goal) = preferences
        .and_then(|p| p.get("healthGoal"))
        .and_then(|v| v.as_str())
    {
        let label = match goal {
            "reduce_fat" => "减脂",
            "gain_muscle" => "增肌",
            "control_sugar" => "控糖",
            "balanced" => "均衡",
            other => other,
        };
        preference_text = format!("健康目标：{label}。");
    }

    let calories_context = if calories_intake > 0.0 {
        format!(
            "\n用户今日已摄入卡路里：{calories_intake:.1} kcal，建议通过运动消耗约 {} kcal。",
            intent.calories_target
        )
    } else {
        String::new()
    };

    let city = detect_city(query)
        .or_else(|| detect_city(&intent.destination))
        .or_else(|| user_location.and_then(reverse_geocode_city));
    let location_context = match city {
        Some(city) => format!(
            "\n用户所在城市：{city}\n重要：每个节点的placeName必须是具体、真实风格的地点名称并包含城市信息（如\"{city}中央公园\"、\"{city}滨江健身步道\"），多个节点的placeName必须互不相同。"
        ),
        None => "\n重要：placeName必须是具体的地点名称（如\"中央公园\"、\"滨江健身步道\"），绝对不要使用\"附近\"等模糊描述；多个节点的placeName必须互不相同。".to_string(),
    };

    let exercise_type_text = intent
        .exercise_type
        .as_deref()
        .map(|t| format!("运动类型：{t}。"))
        .unwrap_or_default();

    format!(
        r#"请为以下餐后运动需求生成详细的运动计划，并以JSON格式返回。

运动区域：{destination}
运动日期：{start} 至 {end}（共{days}天）
目标消耗卡路里：{target} kcal
{exercise_type_text}
{preference_text}{calories_context}{location_context}

要求：
1. 生成具体的运动安排，包括运动类型、地点、时长等
2. 合理安排运动强度和时间，确保能达到目标卡路里消耗
3. 考虑餐后运动的特点（建议餐后30-60分钟开始）
4. title必须根据查询内容生成个性化标题（10-15字），不要总是"餐后运动计划"
5. 如果days>1，需要为每一天生成运动节点，dayIndex从1开始递增
6. 每个节点包含：dayIndex、startTime（HH:mm）、placeName、placeType（walking/running/cycling/park/gym/indoor/outdoor）、duration（分钟）、cost（预计消耗kcal）、notes

只返回JSON，不要其他解释。

返回格式：
{{
    "title": "周末慢跑健身计划",
    "destination": "{destination}",
    "startDate": "{start}",
    "endDate": "{end}",
    "items": [
        {{
            "dayIndex": 1,
            "startTime": "19:00",
            "placeName": "中央公园",
            "placeType": "walking",
            "duration": 30,
            "cost": 150,
            "notes": "餐后散步，建议慢走"
        }}
    ]
}}"#,
        destination = intent.destination,
        start = intent.start_date,
        end = intent.end_date,
        days = intent.days,
        target = intent.calories_target,
    )
}

/// Layer 1: strip vague tokens from destination and every place name,
/// substituting type-appropriate concrete names, with city prefixes.
pub fn ensure_specific_locations(plan: &mut GeneratedPlan, city: Option<&str>) {
    plan.destination = sanitize_place_name(&plan.destination, city);

    for item in &mut plan.items {
        let name = item.place_name.trim();
        if name.is_empty() || FORBIDDEN_TOKENS.iter().any(|t| name.contains(t)) {
            let cleaned = sanitize_place_name(name, None);
            item.place_name = if cleaned != FALLBACK_PLACE {
                sanitize_place_name(&cleaned, city)
            } else {
                sanitize_place_name(default_place_for_type(&item.place_type), city)
            };
        } else {
            item.place_name = sanitize_place_name(name, city);
        }
    }
}

fn default_place_for_type(place_type: &str) -> &'static str {
    match place_type {
        "walking" => "健身步道",
        "running" => "跑步道",
        "cycling" => "骑行道",
        "park" => "中央公园",
        "gym" => "健身房",
        "indoor" => "室内运动场",
        "outdoor" => "户外运动场",
        _ => FALLBACK_PLACE,
    }
}

fn alternatives_for_type(place_type: &str) -> &'static [&'static str] {
    match place_type {
        "walking" => &["健身步道", "公园", "社区广场", "健康步道"],
        "running" => &["跑步道", "健身步道", "运动场", "体育场"],
        "cycling" => &["骑行道", "自行车道", "绿道", "健身步道"],
        "park" => &["公园", "森林公园", "文化公园", "运动公园"],
        "gym" => &["健身房", "健身中心", "体育中心", "运动中心"],
        _ => &[
            "中央公园",
            "世纪公园",
            "奥林匹克公园",
            "滨江健身步道",
            "社区健身广场",
            "体育中心",
            "森林公园",
            "文化公园",
        ],
    }
}

/// Layer 2: every item's place name must be unique within the plan;
/// duplicates are replaced from the per-type alternative list.
pub fn ensure_location_diversity(items: &mut [PlanItemData], city: Option<&str>) {
    let mut used: Vec<String> = Vec::new();
    for item in items.iter_mut() {
        if !used.contains(&item.place_name) {
            used.push(item.place_name.clone());
            continue;
        }

        let replaced = alternatives_for_type(&item.place_type)
            .iter()
            .map(|alt| sanitize_place_name(alt, city))
            .find(|candidate| !used.contains(candidate));
        item.place_name = match replaced {
            Some(candidate) => candidate,
            None => {
                // Exhausted alternatives: suffix with the type tag
                let tagged = format!("{}-{}", item.place_name, item.place_type);
                sanitize_place_name(&tagged, None)
            }
        };
        used.push(item.place_name.clone());
    }
}

fn meal_hint_from_query(query: &str) -> Option<&'static str> {
    if ["早餐", "早饭", "早上", "上午"].iter().any(|k| query.contains(k)) {
        Some("breakfast")
    } else if ["午餐", "午饭", "中午"].iter().any(|k| query.contains(k)) {
        Some("lunch")
    } else if ["晚餐", "晚饭", "傍晚", "晚上", "夜间"].iter().any(|k| query.contains(k)) {
        Some("dinner")
    } else if query.contains("下午") {
        Some("afternoon")
    } else {
        None
    }
}

/// Layer 3: deterministic start-time override. Base time follows the
/// meal-slot keyword; the per-day offset is 30 + (dayIndex*11 mod 31)
/// minutes, clamped to [06:30, 21:30].
pub fn adjust_plan_times(items: &mut [PlanItemData], query: &str, start_date: &str) {
    let hint = meal_hint_from_query(query);
    let today = Local::now().date_naive();
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap_or(today);
    let now = Local::now().time();

    for item in items.iter_mut() {
        item.start_time = compute_start_time(hint, item.day_index.max(1), start, today, now);
    }
}

fn compute_start_time(
    hint: Option<&str>,
    day_index: i64,
    start_date: NaiveDate,
    today: NaiveDate,
    now: NaiveTime,
) -> String {
    let offset_min = 30 + ((day_index * 11) % 31);

    let base_minutes = match hint {
        Some("breakfast") => 8 * 60,
        Some("lunch") => 12 * 60,
        Some("dinner") => 19 * 60,
        Some("afternoon") => 15 * 60,
        _ => {
            if day_index == 1 && start_date == today {
                now.hour() as i64 * 60 + now.minute() as i64
            } else {
                18 * 60
            }
        }
    };
    clamp_minutes(base_minutes + offset_min)
}

fn clamp_minutes(total_minutes: i64) -> String {
    let clamped = total_minutes.clamp(6 * 60 + 30, 21 * 60 + 30);
    format!("{:02}:{:02}", clamped / 60, clamped % 60)
}

/// Fallback plan: one or two walking/running items totaling the calorie
/// target.
pub fn default_plan(intent: &ExerciseIntent) -> GeneratedPlan {
    let mut items = Vec::new();
    let mut remaining = intent.calories_target as f64;

    if remaining >= 150.0 {
        let running_cost = remaining.min(200.0);
        items.push(PlanItemData {
            day_index: 1,
            start_time: "19:30".to_string(),
            place_name: "健身步道".to_string(),
            place_type: "running".to_string(),
            duration: 20,
            cost: running_cost,
            notes: "餐后慢跑，注意控制强度".to_string(),
            mets_value: None,
            calculation_basis: None,
        });
        remaining -= 200.0;
    }
    if remaining > 0.0 {
        // Walking burns roughly 5 kcal per minute
        let walk_duration = ((remaining / 5.0) as i64).max(10);
        items.push(PlanItemData {
            day_index: 1,
            start_time: "20:00".to_string(),
            place_name: "社区公园".to_string(),
            place_type: "walking".to_string(),
            duration: walk_duration,
            cost: remaining,
            notes: "餐后散步".to_string(),
            mets_value: None,
            calculation_basis: None,
        });
    }

    GeneratedPlan {
        title: format!("餐后运动计划（消耗{}卡路里）", intent.calories_target),
        destination: intent.destination.clone(),
        start_date: intent.start_date.clone(),
        end_date: intent.end_date.clone(),
        travelers: vec!["本人".to_string()],
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_strips_forbidden_tokens() {
        assert_eq!(sanitize_place_name("附近的公园", None), "的公园");
        assert_eq!(sanitize_place_name("附近", None), "运动场所");
        assert_eq!(sanitize_place_name("示例测试", None), "运动场所");
    }

    #[test]
    fn test_sanitize_applies_city_prefix_and_cap() {
        assert_eq!(sanitize_place_name("中央公园", Some("北京")), "北京中央公园");
        assert_eq!(sanitize_place_name("北京中央公园", Some("北京")), "北京中央公园");
        let long = "很".repeat(40);
        assert_eq!(sanitize_place_name(&long, None).chars().count(), 30);
    }

    #[test]
    fn test_normalize_intent_fixes_sentinel_date() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let intent = normalize_intent(
            json!({"destination": "北京朝阳公园", "startDate": "2026-01-27", "days": 2}),
            "在北京朝阳公园慢跑",
            0.0,
            today,
        );
        assert_eq!(intent.start_date, "2026-08-01");
        assert_eq!(intent.end_date, "2026-08-02");
        assert_eq!(intent.days, 2);
        assert_eq!(intent.calories_target, 200);
    }

    #[test]
    fn test_normalize_intent_days_from_span() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let intent = normalize_intent(
            json!({"startDate": "2026-08-02", "endDate": "2026-08-04", "days": 1}),
            "三天运动",
            500.0,
            today,
        );
        assert_eq!(intent.days, 3);
        // calories_target defaults to 40% of intake
        assert_eq!(intent.calories_target, 200);
    }

    #[test]
    fn test_normalize_intent_keeps_concrete_remainder() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let intent = normalize_intent(
            json!({"destination": "附近的朝阳公园"}),
            "附近的朝阳公园走走",
            0.0,
            today,
        );
        assert!(intent.destination.contains("朝阳公园"));
        assert!(!intent.destination.contains("附近"));
    }

    #[test]
    fn test_location_diversity_rewrites_duplicates() {
        let mut items = vec![
            PlanItemData {
                day_index: 1,
                start_time: "19:00".into(),
                place_name: "中央公园".into(),
                place_type: "walking".into(),
                duration: 30,
                cost: 100.0,
                notes: String::new(),
                mets_value: None,
                calculation_basis: None,
            },
            PlanItemData {
                day_index: 1,
                start_time: "20:00".into(),
                place_name: "中央公园".into(),
                place_type: "running".into(),
                duration: 20,
                cost: 150.0,
                notes: String::new(),
                mets_value: None,
                calculation_basis: None,
            },
        ];
        ensure_location_diversity(&mut items, None);
        assert_ne!(items[0].place_name, items[1].place_name);
    }

    #[test]
    fn test_time_offset_formula_and_clamp() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 2).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();

        // dinner base 19:00 + (30 + (1*11)%31 = 41) => 19:41
        assert_eq!(
            compute_start_time(Some("dinner"), 1, date, today, noon),
            "19:41"
        );
        // breakfast base 08:00 + (30 + 22) => 08:52
        assert_eq!(
            compute_start_time(Some("breakfast"), 2, date, today, noon),
            "08:52"
        );
        // dinner on a late offset clamps at 21:30
        let late = NaiveTime::from_hms_opt(21, 20, 0).unwrap();
        assert_eq!(compute_start_time(None, 1, today, today, late), "21:30");
    }

    #[test]
    fn test_default_plan_totals_target() {
        let intent = ExerciseIntent {
            destination: "运动场所".into(),
            start_date: "2026-08-01".into(),
            end_date: "2026-08-01".into(),
            days: 1,
            calories_target: 300,
            exercise_type: None,
        };
        let plan = default_plan(&intent);
        let total: f64 = plan.items.iter().map(|i| i.cost).sum();
        assert_eq!(total, 300.0);
        assert_eq!(plan.items.len(), 2);
    }

    #[test]
    fn test_reverse_geocode_city() {
        let beijing = GeoPoint {
            latitude: 39.9,
            longitude: 116.4,
        };
        assert_eq!(reverse_geocode_city(beijing), Some("北京"));
        let ocean = GeoPoint {
            latitude: 0.0,
            longitude: 0.0,
        };
        assert_eq!(reverse_geocode_city(ocean), None);
    }
}
