// src/stats.rs - Diet/exercise statistics aggregators
//
// All aggregators are read-only over diet records, trip plans/items and
// exercise records. They never consult the LLM, so missing data yields
// zeros rather than degraded defaults.

use crate::core::{CoreError, Result};
use crate::database::Database;
use crate::models::*;
use chrono::{Duration, Local, NaiveDate};
use std::collections::BTreeMap;
use std::sync::Arc;

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| CoreError::validation(format!("invalid date {value}, expected YYYY-MM-DD")))
}

fn score_to_status(score: f64) -> &'static str {
    if score >= 85.0 {
        "excellent"
    } else if score >= 65.0 {
        "good"
    } else if score >= 40.0 {
        "fair"
    } else {
        "poor"
    }
}

fn clamp_score(score: f64) -> f64 {
    round1(score.clamp(0.0, 100.0))
}

/// Summed period data feeding the goal-progress evaluators
struct PeriodData {
    total_days: i64,
    active_days: i64,
    days_with_diet: i64,
    days_with_exercise: i64,
    sum_calories: f64,
    avg_calories: f64,
    avg_protein: f64,
    avg_burn: f64,
    protein_ratio: f64,
    fat_ratio: f64,
    carbs_ratio: f64,
}

pub struct StatsService {
    db: Arc<Database>,
}

impl StatsService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Daily energy balance. Burn uses actual exercise records when any
    /// exist for the day, otherwise the planned cost of trip items whose
    /// plan covers the date.
    pub async fn daily_calories(&self, user_id: i64, date: &str) -> Result<DailyCalorieStats> {
        let target = parse_date(date)?;
        let date_str = target.format("%Y-%m-%d").to_string();

        let diet_records = self.db.diet_records_on(user_id, &date_str).await?;
        let mut intake_calories = 0.0;
        let mut meal_breakdown: BTreeMap<String, f64> = [
            ("breakfast".to_string(), 0.0),
            ("lunch".to_string(), 0.0),
            ("dinner".to_string(), 0.0),
            ("snack".to_string(), 0.0),
        ]
        .into_iter()
        .collect();

        for record in &diet_records {
            intake_calories += record.calories;
            let slot = normalize_meal_type(&record.meal_type);
            if let Some(total) = meal_breakdown.get_mut(&slot) {
                *total += record.calories;
            }
        }

        let trip_items = self.db.trip_items_covering(user_id, &date_str).await?;
        let mut planned_burn_calories = 0.0;
        let mut exercise_count = 0i64;
        let mut exercise_duration = 0i64;
        for item in &trip_items {
            planned_burn_calories += item.cost;
            exercise_count += 1;
            exercise_duration += item.duration;
        }

        let exercise_records = self.db.exercise_records_on(user_id, &date_str).await?;
        let actual_exercise_count = exercise_records.len() as i64;
        let mut actual_burn_calories = 0.0;
        let mut actual_exercise_duration = 0i64;
        for record in &exercise_records {
            actual_burn_calories += record.actual_calories;
            actual_exercise_duration += record.actual_duration;
        }

        let burn_calories = if actual_exercise_count > 0 {
            actual_burn_calories
        } else {
            planned_burn_calories
        };

        let net_calories = intake_calories - burn_calories;

        // None when no plan exists for the day; 0 when a plan exists but
        // nothing was done.
        let goal_achievement_rate = if planned_burn_calories > 0.0 {
            Some(round1(actual_burn_calories / planned_burn_calories * 100.0))
        } else {
            None
        };

        Ok(DailyCalorieStats {
            date: date_str,
            user_id,
            intake_calories: round2(intake_calories),
            meal_count: diet_records.len() as i64,
            burn_calories: round2(burn_calories),
            exercise_count,
            exercise_duration,
            planned_burn_calories: round2(planned_burn_calories),
            actual_burn_calories: round2(actual_burn_calories),
            actual_exercise_count,
            actual_exercise_duration,
            net_calories: round2(net_calories),
            calorie_deficit: round2(net_calories),
            goal_achievement_rate,
            meal_breakdown,
        })
    }

    /// Weekly balance: seven daily views starting at week_start, with
    /// averages over active days (a day with any diet or exercise entry).
    pub async fn weekly_calories(&self, user_id: i64, week_start: &str) -> Result<WeeklyCalorieStats> {
        let start = parse_date(week_start)?;
        let end = start + Duration::days(6);

        let mut total_intake = 0.0;
        let mut total_burn = 0.0;
        let mut total_meals = 0i64;
        let mut total_exercises = 0i64;
        let mut active_days = 0i64;
        let mut daily_breakdown = Vec::with_capacity(7);

        for i in 0..7 {
            let day = start + Duration::days(i);
            let daily = self
                .daily_calories(user_id, &day.format("%Y-%m-%d").to_string())
                .await?;

            total_intake += daily.intake_calories;
            total_burn += daily.burn_calories;
            total_meals += daily.meal_count;
            total_exercises += daily.exercise_count;
            // Active day for the weekly averages: any diet record, or any
            // plan item covering the day (exercise_count counts planned
            // items, not logged exercise records).
            if daily.meal_count > 0 || daily.exercise_count > 0 {
                active_days += 1;
            }
            daily_breakdown.push(DailyBreakdown {
                date: daily.date,
                intake_calories: daily.intake_calories,
                burn_calories: daily.burn_calories,
                net_calories: daily.net_calories,
            });
        }

        let days_for_avg = active_days.max(1) as f64;
        Ok(WeeklyCalorieStats {
            week_start: start.format("%Y-%m-%d").to_string(),
            week_end: end.format("%Y-%m-%d").to_string(),
            user_id,
            total_intake: round2(total_intake),
            total_burn: round2(total_burn),
            total_net: round2(total_intake - total_burn),
            avg_intake: round2(total_intake / days_for_avg),
            avg_burn: round2(total_burn / days_for_avg),
            avg_net: round2((total_intake - total_burn) / days_for_avg),
            total_meals,
            total_exercises,
            active_days,
            daily_breakdown,
        })
    }

    fn nutrient_comparison(band: GuidelineBand, actual_ratio: f64, has_data: bool) -> NutrientComparison {
        if !has_data {
            return NutrientComparison {
                actual_ratio: 0.0,
                recommended_min: band.min,
                recommended_max: band.max,
                status: "low".to_string(),
                message: "暂无数据".to_string(),
            };
        }
        let (status, message) = if actual_ratio < band.min {
            ("low", format!("{}摄入偏低，建议适当增加{}摄入", band.name, band.name))
        } else if actual_ratio > band.max {
            ("high", format!("{}摄入偏高，建议控制{}摄入", band.name, band.name))
        } else {
            ("normal", format!("{}摄入在建议范围内", band.name))
        };
        NutrientComparison {
            actual_ratio: round1(actual_ratio),
            recommended_min: band.min,
            recommended_max: band.max,
            status: status.to_string(),
            message,
        }
    }

    /// Daily macronutrient totals, energy shares, and the comparison
    /// against the dietary guideline bands.
    pub async fn daily_nutrients(&self, user_id: i64, date: &str) -> Result<DailyNutrientStats> {
        let target = parse_date(date)?;
        let date_str = target.format("%Y-%m-%d").to_string();
        let diet_records = self.db.diet_records_on(user_id, &date_str).await?;

        let mut total_protein = 0.0;
        let mut total_fat = 0.0;
        let mut total_carbs = 0.0;
        let mut total_calories = 0.0;
        for record in &diet_records {
            total_protein += record.protein;
            total_fat += record.fat;
            total_carbs += record.carbs;
            total_calories += record.calories;
        }

        let protein_calories = total_protein * PROTEIN_KCAL_PER_GRAM;
        let fat_calories = total_fat * FAT_KCAL_PER_GRAM;
        let carbs_calories = total_carbs * CARBS_KCAL_PER_GRAM;
        let nutrient_calories = protein_calories + fat_calories + carbs_calories;

        let (protein_ratio, fat_ratio, carbs_ratio) = if nutrient_calories > 0.0 {
            (
                protein_calories / nutrient_calories * 100.0,
                fat_calories / nutrient_calories * 100.0,
                carbs_calories / nutrient_calories * 100.0,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        let has_data = nutrient_calories > 0.0;
        Ok(DailyNutrientStats {
            date: date_str,
            user_id,
            total_protein: round2(total_protein),
            total_fat: round2(total_fat),
            total_carbs: round2(total_carbs),
            total_calories: round2(total_calories),
            protein_calories: round2(protein_calories),
            fat_calories: round2(fat_calories),
            carbs_calories: round2(carbs_calories),
            protein_ratio: round1(protein_ratio),
            fat_ratio: round1(fat_ratio),
            carbs_ratio: round1(carbs_ratio),
            meal_count: diet_records.len() as i64,
            guidelines_comparison: GuidelinesComparison {
                protein: Self::nutrient_comparison(PROTEIN_GUIDELINE, protein_ratio, has_data),
                fat: Self::nutrient_comparison(FAT_GUIDELINE, fat_ratio, has_data),
                carbs: Self::nutrient_comparison(CARBS_GUIDELINE, carbs_ratio, has_data),
            },
        })
    }

    /// Consecutive active days counting back from end_date
    async fn streak_days(&self, user_id: i64, end_date: NaiveDate) -> Result<i64> {
        let mut streak = 0i64;
        let mut current = end_date;
        loop {
            let date_str = current.format("%Y-%m-%d").to_string();
            let has_diet = !self.db.diet_records_on(user_id, &date_str).await?.is_empty();
            let has_exercise = !self
                .db
                .exercise_records_on(user_id, &date_str)
                .await?
                .is_empty();
            if has_diet || has_exercise {
                streak += 1;
                current -= Duration::days(1);
            } else {
                break;
            }
        }
        Ok(streak)
    }

    async fn gather_period_data(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PeriodData> {
        let total_days = (end - start).num_days() + 1;
        let mut days_with_diet = 0i64;
        let mut days_with_exercise = 0i64;
        let mut sum_calories = 0.0;
        let mut sum_protein = 0.0;
        let mut sum_fat = 0.0;
        let mut sum_carbs = 0.0;
        let mut sum_burn = 0.0;

        for i in 0..total_days {
            let day = (start + Duration::days(i)).format("%Y-%m-%d").to_string();

            let diet_records = self.db.diet_records_on(user_id, &day).await?;
            if !diet_records.is_empty() {
                days_with_diet += 1;
            }
            for record in &diet_records {
                sum_calories += record.calories;
                sum_protein += record.protein;
                sum_fat += record.fat;
                sum_carbs += record.carbs;
            }

            let exercise_records = self.db.exercise_records_on(user_id, &day).await?;
            if !exercise_records.is_empty() {
                days_with_exercise += 1;
            }
            for record in &exercise_records {
                sum_burn += record.actual_calories;
            }
        }

        let active_days = days_with_diet.max(days_with_exercise);
        let divisor = active_days.max(1) as f64;

        let protein_cal = sum_protein * PROTEIN_KCAL_PER_GRAM;
        let fat_cal = sum_fat * FAT_KCAL_PER_GRAM;
        let carbs_cal = sum_carbs * CARBS_KCAL_PER_GRAM;
        let nutrient_total = protein_cal + fat_cal + carbs_cal;
        let (protein_ratio, fat_ratio, carbs_ratio) = if nutrient_total > 0.0 {
            (
                protein_cal / nutrient_total * 100.0,
                fat_cal / nutrient_total * 100.0,
                carbs_cal / nutrient_total * 100.0,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        Ok(PeriodData {
            total_days,
            active_days,
            days_with_diet,
            days_with_exercise,
            sum_calories,
            avg_calories: sum_calories / divisor,
            avg_protein: sum_protein / divisor,
            avg_burn: sum_burn / divisor,
            protein_ratio,
            fat_ratio,
            carbs_ratio,
        })
    }

    fn burn_dimension(
        data: &PeriodData,
        name: &str,
        target_burn: f64,
        empty_score: f64,
        no_record_suggestion: Option<&str>,
        suggestions: &mut Vec<String>,
    ) -> GoalDimension {
        let avg_burn = data.avg_burn;
        let (score, description) = if avg_burn <= 0.0 {
            if let Some(suggestion) = no_record_suggestion {
                suggestions.push(suggestion.to_string());
            }
            (empty_score, "暂无运动记录".to_string())
        } else {
            let score = (avg_burn / target_burn * 100.0).min(100.0);
            (
                score,
                format!("日均运动消耗{avg_burn:.0}kcal，建议{target_burn:.0}kcal"),
            )
        };
        GoalDimension {
            name: name.to_string(),
            score: clamp_score(score),
            status: score_to_status(score).to_string(),
            current_value: round1(avg_burn),
            target_value: target_burn,
            unit: "kcal/天".to_string(),
            description,
        }
    }

    fn evaluate_reduce_fat(data: &PeriodData, user: &User) -> (Vec<GoalDimension>, Vec<String>) {
        let mut dims = Vec::new();
        let mut suggestions = Vec::new();

        let target_intake = user.bmr() * 1.2 - 500.0;

        let avg_cal = data.avg_calories;
        let (cal_score, cal_desc) = if avg_cal <= 0.0 {
            (50.0, "暂无饮食数据".to_string())
        } else {
            let ratio = if target_intake > 0.0 { avg_cal / target_intake } else { 1.0 };
            let score = if ratio <= 1.0 {
                (60.0 + 40.0 * ratio).min(100.0)
            } else {
                (100.0 - (ratio - 1.0) * 150.0).max(0.0)
            };
            (
                score,
                format!("日均摄入{avg_cal:.0}kcal，建议{target_intake:.0}kcal"),
            )
        };
        dims.push(GoalDimension {
            name: "热量控制".to_string(),
            score: clamp_score(cal_score),
            status: score_to_status(cal_score).to_string(),
            current_value: round1(avg_cal),
            target_value: round1(target_intake),
            unit: "kcal/天".to_string(),
            description: cal_desc,
        });
        if avg_cal > target_intake * 1.1 && avg_cal > 0.0 {
            suggestions.push("建议降低每日热量摄入，保持适度热量缺口以促进减脂".to_string());
        }

        let fat_r = data.fat_ratio;
        let fat_max = FAT_GUIDELINE.max;
        let (fat_score, fat_desc) = if data.sum_calories <= 0.0 {
            (50.0, "暂无营养数据".to_string())
        } else if fat_r <= fat_max {
            (
                80.0 + (fat_max - fat_r),
                format!("脂肪占比{fat_r:.1}%，在建议范围内"),
            )
        } else {
            suggestions.push("脂肪摄入比例偏高，建议减少油炸和高脂食物".to_string());
            (
                (80.0 - (fat_r - fat_max) * 5.0).max(0.0),
                format!("脂肪占比{fat_r:.1}%，超出建议上限{fat_max}%"),
            )
        };
        dims.push(GoalDimension {
            name: "脂肪比例".to_string(),
            score: clamp_score(fat_score),
            status: score_to_status(fat_score).to_string(),
            current_value: round1(fat_r),
            target_value: fat_max,
            unit: "%".to_string(),
            description: fat_desc,
        });

        let burn = Self::burn_dimension(
            data,
            "运动消耗",
            300.0,
            20.0,
            Some("建议每日进行至少30分钟有氧运动以促进减脂"),
            &mut suggestions,
        );
        if data.avg_burn > 0.0 && data.avg_burn < 300.0 * 0.7 {
            suggestions.push("运动消耗不足，建议增加有氧运动频率和时长".to_string());
        }
        dims.push(burn);

        (dims, suggestions)
    }

    fn evaluate_gain_muscle(data: &PeriodData, user: &User) -> (Vec<GoalDimension>, Vec<String>) {
        let mut dims = Vec::new();
        let mut suggestions = Vec::new();
        let (weight, ..) = user.body_params();

        // Muscle-gain protein target: 1.8 g/kg body weight
        let target_protein = weight * 1.8;
        let avg_protein = data.avg_protein;
        let (prot_score, prot_desc) = if avg_protein <= 0.0 {
            suggestions.push("增肌需要充足蛋白质，建议每日摄入1.6-2.2g/kg体重".to_string());
            (20.0, "暂无蛋白质摄入数据".to_string())
        } else {
            let ratio = avg_protein / target_protein;
            let score = if ratio >= 1.0 {
                (85.0 + (ratio - 1.0) * 30.0).min(100.0)
            } else {
                (ratio * 85.0).max(0.0)
            };
            if ratio < 0.8 {
                suggestions.push(format!("蛋白质摄入不足，建议增加至每日{target_protein:.0}g以上"));
            }
            (
                score,
                format!("日均蛋白质{avg_protein:.1}g，建议{target_protein:.0}g"),
            )
        };
        dims.push(GoalDimension {
            name: "蛋白质摄入".to_string(),
            score: clamp_score(prot_score),
            status: score_to_status(prot_score).to_string(),
            current_value: round1(avg_protein),
            target_value: round1(target_protein),
            unit: "g/天".to_string(),
            description: prot_desc,
        });

        let target_intake = user.bmr() * 1.4 + 300.0;
        let avg_cal = data.avg_calories;
        let (cal_score, cal_desc) = if avg_cal <= 0.0 {
            (30.0, "暂无热量数据".to_string())
        } else {
            let ratio = avg_cal / target_intake;
            let score = if ratio >= 0.9 {
                (70.0 + ratio * 30.0).min(100.0)
            } else {
                (ratio * 80.0).max(0.0)
            };
            if ratio < 0.85 {
                suggestions.push("热量摄入不足以支撑增肌，建议适当增加热量摄入".to_string());
            }
            (
                score,
                format!("日均摄入{avg_cal:.0}kcal，增肌建议{target_intake:.0}kcal"),
            )
        };
        dims.push(GoalDimension {
            name: "热量充足".to_string(),
            score: clamp_score(cal_score),
            status: score_to_status(cal_score).to_string(),
            current_value: round1(avg_cal),
            target_value: round1(target_intake),
            unit: "kcal/天".to_string(),
            description: cal_desc,
        });

        dims.push(Self::burn_dimension(
            data,
            "运动消耗",
            400.0,
            20.0,
            Some("增肌需要规律的力量训练，建议每周至少3次"),
            &mut suggestions,
        ));

        (dims, suggestions)
    }

    fn evaluate_control_sugar(data: &PeriodData, user: &User) -> (Vec<GoalDimension>, Vec<String>) {
        let mut dims = Vec::new();
        let mut suggestions = Vec::new();

        let carbs_r = data.carbs_ratio;
        let carbs_max = 50.0;
        let (carbs_score, carbs_desc) = if data.sum_calories <= 0.0 {
            (50.0, "暂无营养数据".to_string())
        } else if carbs_r <= carbs_max {
            (
                80.0 + (carbs_max - carbs_r),
                format!("碳水占比{carbs_r:.1}%，控制良好"),
            )
        } else {
            suggestions.push("碳水化合物比例偏高，建议减少精制碳水和甜食摄入".to_string());
            (
                (80.0 - (carbs_r - carbs_max) * 4.0).max(0.0),
                format!("碳水占比{carbs_r:.1}%，建议控制在{carbs_max}%以下"),
            )
        };
        dims.push(GoalDimension {
            name: "碳水比例".to_string(),
            score: clamp_score(carbs_score),
            status: score_to_status(carbs_score).to_string(),
            current_value: round1(carbs_r),
            target_value: carbs_max,
            unit: "%".to_string(),
            description: carbs_desc,
        });

        let target_intake = user.bmr() * 1.3;
        let avg_cal = data.avg_calories;
        let (cal_score, cal_desc) = if avg_cal <= 0.0 {
            (50.0, "暂无热量数据".to_string())
        } else {
            let ratio = if target_intake > 0.0 { avg_cal / target_intake } else { 1.0 };
            // Reward staying inside the +-10% band of the target
            let score = if (0.85..=1.1).contains(&ratio) {
                90.0
            } else if ratio < 0.85 {
                (90.0 - (0.85 - ratio) * 200.0).max(40.0)
            } else {
                (90.0 - (ratio - 1.1) * 150.0).max(0.0)
            };
            if ratio > 1.2 {
                suggestions.push("热量摄入偏高，建议适当控制总热量".to_string());
            }
            (
                score,
                format!("日均摄入{avg_cal:.0}kcal，建议{target_intake:.0}kcal"),
            )
        };
        dims.push(GoalDimension {
            name: "热量控制".to_string(),
            score: clamp_score(cal_score),
            status: score_to_status(cal_score).to_string(),
            current_value: round1(avg_cal),
            target_value: round1(target_intake),
            unit: "kcal/天".to_string(),
            description: cal_desc,
        });

        dims.push(Self::burn_dimension(
            data,
            "运动辅助",
            250.0,
            30.0,
            Some("适当运动有助于控糖，建议每日进行中等强度运动"),
            &mut suggestions,
        ));

        (dims, suggestions)
    }

    fn evaluate_balanced(data: &PeriodData, _user: &User) -> (Vec<GoalDimension>, Vec<String>) {
        let mut dims = Vec::new();
        let mut suggestions = Vec::new();

        let bands = [
            (PROTEIN_GUIDELINE, data.protein_ratio),
            (FAT_GUIDELINE, data.fat_ratio),
            (CARBS_GUIDELINE, data.carbs_ratio),
        ];
        let (balance_score, balance_desc) = if data.sum_calories <= 0.0 {
            (50.0, "暂无营养数据".to_string())
        } else {
            let mut score_parts = Vec::new();
            for (band, ratio) in &bands {
                let mid = (band.min + band.max) / 2.0;
                let half_range = (band.max - band.min) / 2.0;
                if *ratio >= band.min && *ratio <= band.max {
                    let dist = (ratio - mid).abs() / half_range;
                    score_parts.push(85.0 + (1.0 - dist) * 15.0);
                } else {
                    let deviation = if *ratio < band.min {
                        band.min - ratio
                    } else {
                        ratio - band.max
                    };
                    score_parts.push((80.0 - deviation * 5.0).max(0.0));
                }
            }
            let score = score_parts.iter().sum::<f64>() / score_parts.len() as f64;
            let in_range = bands
                .iter()
                .filter(|(band, ratio)| *ratio >= band.min && *ratio <= band.max)
                .count();

            if data.protein_ratio < PROTEIN_GUIDELINE.min {
                suggestions.push("蛋白质摄入偏低，建议增加优质蛋白来源".to_string());
            }
            if data.fat_ratio > FAT_GUIDELINE.max {
                suggestions.push("脂肪摄入偏高，建议减少油脂摄入".to_string());
            }
            if data.carbs_ratio > CARBS_GUIDELINE.max {
                suggestions.push("碳水化合物摄入偏高，建议适当控制主食量".to_string());
            }
            (score, format!("三大营养素{in_range}/3项在推荐范围内"))
        };
        dims.push(GoalDimension {
            name: "营养均衡".to_string(),
            score: clamp_score(balance_score),
            status: score_to_status(balance_score).to_string(),
            current_value: round1(data.sum_calories / data.active_days.max(1) as f64),
            target_value: 100.0,
            unit: "分".to_string(),
            description: balance_desc,
        });

        let exercise_ratio = data.days_with_exercise as f64 / data.total_days.max(1) as f64;
        let target_exercise_ratio = 0.7;
        let (ex_score, ex_desc) = if data.days_with_exercise == 0 {
            suggestions.push("建议保持规律运动习惯，每周至少运动5天".to_string());
            (20.0, "暂无运动记录".to_string())
        } else {
            if exercise_ratio < 0.5 {
                suggestions.push("运动频率偏低，建议增加运动天数".to_string());
            }
            (
                (exercise_ratio / target_exercise_ratio * 100.0).min(100.0),
                format!(
                    "过去{}天中{}天有运动记录",
                    data.total_days, data.days_with_exercise
                ),
            )
        };
        dims.push(GoalDimension {
            name: "运动规律".to_string(),
            score: clamp_score(ex_score),
            status: score_to_status(ex_score).to_string(),
            current_value: round1(exercise_ratio * 100.0),
            target_value: round1(target_exercise_ratio * 100.0),
            unit: "%".to_string(),
            description: ex_desc,
        });

        let diet_ratio = data.days_with_diet as f64 / data.total_days.max(1) as f64;
        let target_diet_ratio = 0.85;
        let (diet_score, diet_desc) = if data.days_with_diet == 0 {
            suggestions.push("建议坚持记录每日饮食，有助于管理健康".to_string());
            (20.0, "暂无饮食记录".to_string())
        } else {
            (
                (diet_ratio / target_diet_ratio * 100.0).min(100.0),
                format!(
                    "过去{}天中{}天有饮食记录",
                    data.total_days, data.days_with_diet
                ),
            )
        };
        dims.push(GoalDimension {
            name: "饮食规律".to_string(),
            score: clamp_score(diet_score),
            status: score_to_status(diet_score).to_string(),
            current_value: round1(diet_ratio * 100.0),
            target_value: round1(target_diet_ratio * 100.0),
            unit: "%".to_string(),
            description: diet_desc,
        });

        (dims, suggestions)
    }

    /// Multi-dimensional goal progress, dispatched on the user's health
    /// goal. Overall score is the arithmetic mean of dimension scores.
    pub async fn goal_progress(&self, user_id: i64, days: i64) -> Result<GoalProgressData> {
        let today = Local::now().date_naive();
        let start = today - Duration::days((days - 1).max(0));

        let user = self.db.get_user(user_id).await?.unwrap_or(User {
            id: user_id,
            nickname: String::new(),
            password_hash: String::new(),
            health_goal: HealthGoal::Balanced,
            allergens: Vec::new(),
            weight: None,
            height: None,
            age: None,
            gender: None,
            travel_preference: None,
            daily_budget: None,
            created_at: String::new(),
        });

        let health_goal = match user.health_goal {
            HealthGoal::Unset => HealthGoal::Balanced,
            goal => goal,
        };

        let data = self.gather_period_data(user_id, start, today).await?;
        let streak = self.streak_days(user_id, today).await?;

        let (dimensions, mut suggestions) = match health_goal {
            HealthGoal::ReduceFat => Self::evaluate_reduce_fat(&data, &user),
            HealthGoal::GainMuscle => Self::evaluate_gain_muscle(&data, &user),
            HealthGoal::ControlSugar => Self::evaluate_control_sugar(&data, &user),
            HealthGoal::Balanced | HealthGoal::Unset => Self::evaluate_balanced(&data, &user),
        };

        if streak == 0 {
            suggestions.push("开始记录你的饮食和运动吧，坚持是健康的关键！".to_string());
        } else if streak >= 7 {
            suggestions.push(format!("已连续记录{streak}天，非常棒，继续保持！"));
        }

        let overall_score = if dimensions.is_empty() {
            0.0
        } else {
            dimensions.iter().map(|d| d.score).sum::<f64>() / dimensions.len() as f64
        };
        let overall_score = clamp_score(overall_score);

        Ok(GoalProgressData {
            user_id,
            health_goal: health_goal.as_str().to_string(),
            health_goal_label: health_goal.label().to_string(),
            period_days: days,
            start_date: start.format("%Y-%m-%d").to_string(),
            end_date: today.format("%Y-%m-%d").to_string(),
            overall_score,
            overall_status: score_to_status(overall_score).to_string(),
            dimensions,
            suggestions,
            streak_days: streak,
        })
    }

    fn rate_frequency(active_days: i64, total_days: i64, period: &str) -> (String, String) {
        if total_days == 0 {
            return (
                "insufficient".to_string(),
                "暂无运动数据，建议开始规律运动".to_string(),
            );
        }
        if period == "week" {
            let (rating, suggestion) = if active_days >= 5 {
                ("excellent", "运动频率优秀，保持每周5天以上运动习惯！".to_string())
            } else if active_days >= 3 {
                ("good", "运动频率良好，建议逐步增加到每周5天".to_string())
            } else if active_days >= 1 {
                ("fair", "运动频率偏低，建议每周至少运动3天".to_string())
            } else {
                ("insufficient", "本周暂无运动记录，建议尽快开始运动".to_string())
            };
            (rating.to_string(), suggestion)
        } else {
            let weekly_avg = active_days as f64 / (total_days as f64 / 7.0);
            let (rating, suggestion) = if weekly_avg >= 5.0 {
                ("excellent", format!("月均每周运动{weekly_avg:.1}天，频率优秀！"))
            } else if weekly_avg >= 3.0 {
                ("good", format!("月均每周运动{weekly_avg:.1}天，频率良好"))
            } else if weekly_avg >= 1.0 {
                ("fair", format!("月均每周运动{weekly_avg:.1}天，建议增加运动频率"))
            } else {
                ("insufficient", "本月运动频率不足，建议每周至少运动3天".to_string())
            };
            (rating.to_string(), suggestion)
        }
    }

    /// Exercise frequency over the last 7 or 30 days (inclusive of
    /// today), with a zero-filled daily series and per-type distribution.
    pub async fn exercise_frequency(&self, user_id: i64, period: &str) -> Result<ExerciseFrequencyData> {
        if period != "week" && period != "month" {
            return Err(CoreError::validation(format!(
                "invalid period {period}, expected week or month"
            )));
        }

        let today = Local::now().date_naive();
        let (total_days, period_label) = if period == "month" {
            (30i64, "最近一个月")
        } else {
            (7i64, "最近一周")
        };
        let start = today - Duration::days(total_days - 1);

        let records = self
            .db
            .exercise_records_between(
                user_id,
                &start.format("%Y-%m-%d").to_string(),
                &today.format("%Y-%m-%d").to_string(),
            )
            .await?;

        struct DayAgg {
            count: i64,
            duration: i64,
            calories: f64,
            types: Vec<String>,
        }
        let mut daily_map: BTreeMap<String, DayAgg> = BTreeMap::new();
        // Encounter order matters for percentage tie-breaking
        let mut type_order: Vec<String> = Vec::new();
        let mut type_map: BTreeMap<String, (i64, i64, f64)> = BTreeMap::new();

        for record in &records {
            let exercise_type = if record.exercise_type.is_empty() {
                "outdoor".to_string()
            } else {
                record.exercise_type.clone()
            };
            let day = daily_map.entry(record.exercise_date.clone()).or_insert(DayAgg {
                count: 0,
                duration: 0,
                calories: 0.0,
                types: Vec::new(),
            });
            day.count += 1;
            day.duration += record.actual_duration;
            day.calories += record.actual_calories;
            if !day.types.contains(&exercise_type) {
                day.types.push(exercise_type.clone());
            }

            if !type_order.contains(&exercise_type) {
                type_order.push(exercise_type.clone());
            }
            let entry = type_map.entry(exercise_type).or_insert((0, 0, 0.0));
            entry.0 += 1;
            entry.1 += record.actual_duration;
            entry.2 += record.actual_calories;
        }

        let mut daily_data = Vec::with_capacity(total_days as usize);
        for i in 0..total_days {
            let day = (start + Duration::days(i)).format("%Y-%m-%d").to_string();
            match daily_map.get(&day) {
                Some(agg) => {
                    let mut types = agg.types.clone();
                    types.sort();
                    daily_data.push(DailyExerciseFrequency {
                        date: day,
                        count: agg.count,
                        total_duration: agg.duration,
                        total_calories: round2(agg.calories),
                        exercise_types: types,
                    });
                }
                None => daily_data.push(DailyExerciseFrequency {
                    date: day,
                    count: 0,
                    total_duration: 0,
                    total_calories: 0.0,
                    exercise_types: Vec::new(),
                }),
            }
        }

        let total_count: i64 = type_map.values().map(|(count, ..)| count).sum();
        // Sort descending by count, ties broken by encounter order
        let mut ordered_types: Vec<String> = type_order.clone();
        ordered_types.sort_by_key(|t| std::cmp::Reverse(type_map.get(t).map(|(c, ..)| *c).unwrap_or(0)));

        let type_distribution: Vec<ExerciseTypeDistribution> = ordered_types
            .iter()
            .map(|exercise_type| {
                let (count, duration, calories) = type_map
                    .get(exercise_type)
                    .copied()
                    .unwrap_or((0, 0, 0.0));
                let percentage = if total_count > 0 {
                    round1(count as f64 / total_count as f64 * 100.0)
                } else {
                    0.0
                };
                ExerciseTypeDistribution {
                    exercise_type: exercise_type.clone(),
                    label: exercise_type_label(exercise_type).to_string(),
                    count,
                    total_duration: duration,
                    total_calories: round2(calories),
                    percentage,
                }
            })
            .collect();

        let active_days = daily_map.len() as i64;
        let total_duration: i64 = daily_map.values().map(|agg| agg.duration).sum();
        let total_calories: f64 = daily_map.values().map(|agg| agg.calories).sum();

        let weeks_in_period = total_days as f64 / 7.0;
        let avg_frequency = round1(total_count as f64 / weeks_in_period);
        let (avg_duration, avg_calories) = if total_count > 0 {
            (
                round1(total_duration as f64 / total_count as f64),
                round1(total_calories / total_count as f64),
            )
        } else {
            (0.0, 0.0)
        };

        let (rating, suggestion) = Self::rate_frequency(active_days, total_days, period);

        Ok(ExerciseFrequencyData {
            user_id,
            period: period.to_string(),
            period_label: period_label.to_string(),
            start_date: start.format("%Y-%m-%d").to_string(),
            end_date: today.format("%Y-%m-%d").to_string(),
            total_days,
            active_days,
            total_exercise_count: total_count,
            total_duration,
            total_calories: round2(total_calories),
            avg_frequency,
            avg_duration_per_session: avg_duration,
            avg_calories_per_session: avg_calories,
            daily_data,
            type_distribution,
            frequency_rating: rating,
            frequency_suggestion: suggestion,
        })
    }
}
