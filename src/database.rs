// src/database.rs - Database integration module

use crate::core::{CoreError, Result};
use crate::models::*;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use tracing::info;

/// Database connection and queries. Dates are stored as ISO `YYYY-MM-DD`
/// text, composite fields as JSON strings.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to database: {database_url}");
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(CoreError::Database)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.create_tables().await?;
        info!("Database initialized successfully");
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nickname TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                health_goal TEXT NOT NULL DEFAULT 'balanced',
                allergens TEXT NOT NULL DEFAULT '[]',
                weight REAL,
                height REAL,
                age INTEGER,
                gender TEXT,
                travel_preference TEXT,
                daily_budget INTEGER,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS diet_record (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES user(id),
                food_name TEXT NOT NULL,
                calories REAL NOT NULL,
                protein REAL NOT NULL DEFAULT 0,
                fat REAL NOT NULL DEFAULT 0,
                carbs REAL NOT NULL DEFAULT 0,
                meal_type TEXT NOT NULL DEFAULT '',
                record_date TEXT NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trip_plan (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                destination TEXT NOT NULL DEFAULT '',
                latitude REAL,
                longitude REAL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                travelers TEXT NOT NULL DEFAULT '[]',
                status TEXT NOT NULL DEFAULT 'planning',
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trip_item (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                trip_id INTEGER NOT NULL REFERENCES trip_plan(id) ON DELETE CASCADE,
                day_index INTEGER NOT NULL,
                start_time TEXT NOT NULL DEFAULT '',
                place_name TEXT NOT NULL,
                place_type TEXT NOT NULL DEFAULT '',
                duration INTEGER NOT NULL DEFAULT 0,
                cost REAL NOT NULL DEFAULT 0,
                latitude REAL,
                longitude REAL,
                notes TEXT NOT NULL DEFAULT '',
                sort_order INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS exercise_record (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES user(id),
                plan_id INTEGER REFERENCES trip_plan(id) ON DELETE SET NULL,
                exercise_type TEXT NOT NULL DEFAULT 'walking',
                actual_calories REAL NOT NULL,
                actual_duration INTEGER NOT NULL,
                distance REAL,
                route_data TEXT,
                planned_calories REAL,
                planned_duration INTEGER,
                exercise_date TEXT NOT NULL,
                started_at TEXT,
                ended_at TEXT,
                notes TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS meal_comparison (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES user(id),
                before_image_url TEXT,
                before_features TEXT,
                after_image_url TEXT,
                after_features TEXT,
                consumption_ratio REAL,
                original_calories REAL,
                original_protein REAL,
                original_fat REAL,
                original_carbs REAL,
                net_calories REAL,
                net_protein REAL,
                net_fat REAL,
                net_carbs REAL,
                status TEXT NOT NULL DEFAULT 'pending_before',
                comparison_analysis TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS menu_recognition (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER REFERENCES user(id),
                dishes TEXT NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ai_call_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER,
                call_type TEXT NOT NULL,
                model_name TEXT NOT NULL,
                input_summary TEXT,
                output_summary TEXT,
                success INTEGER NOT NULL DEFAULT 1,
                error_message TEXT,
                latency_ms INTEGER,
                token_usage INTEGER,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // === USER OPERATIONS ===

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> User {
        let allergens: Vec<String> = row
            .get::<Option<String>, _>("allergens")
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        User {
            id: row.get("id"),
            nickname: row.get("nickname"),
            password_hash: row.get("password_hash"),
            health_goal: HealthGoal::parse(&row.get::<String, _>("health_goal")),
            allergens,
            weight: row.get("weight"),
            height: row.get("height"),
            age: row.get("age"),
            gender: row.get("gender"),
            travel_preference: row.get("travel_preference"),
            daily_budget: row.get("daily_budget"),
            created_at: row.get::<Option<String>, _>("created_at").unwrap_or_default(),
        }
    }

    pub async fn create_user(&self, nickname: &str, password_hash: &str) -> Result<User> {
        let result = sqlx::query("INSERT INTO user (nickname, password_hash) VALUES (?, ?)")
            .bind(nickname)
            .bind(password_hash)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => {
                let user = self
                    .get_user(done.last_insert_rowid())
                    .await?
                    .ok_or_else(|| CoreError::internal("user vanished after insert"))?;
                info!("User {} registered", user.id);
                Ok(user)
            }
            Err(sqlx::Error::Database(e)) if e.message().contains("UNIQUE") => Err(
                CoreError::conflict(format!("nickname {nickname} is already taken")),
            ),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM user WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| Self::row_to_user(&row)))
    }

    pub async fn get_user_by_nickname(&self, nickname: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM user WHERE nickname = ?")
            .bind(nickname)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| Self::row_to_user(&row)))
    }

    pub async fn update_preferences(
        &self,
        user_id: i64,
        request: &UpdatePreferencesRequest,
    ) -> Result<User> {
        let mut user = self
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("user {user_id} does not exist")))?;

        if let Some(nickname) = &request.nickname {
            user.nickname = nickname.clone();
        }
        if let Some(goal) = &request.health_goal {
            user.health_goal = HealthGoal::parse(goal);
        }
        if let Some(allergens) = &request.allergens {
            user.allergens = allergens.clone();
        }
        if request.weight.is_some() {
            user.weight = request.weight;
        }
        if request.height.is_some() {
            user.height = request.height;
        }
        if request.age.is_some() {
            user.age = request.age;
        }
        if request.gender.is_some() {
            user.gender = request.gender.clone();
        }
        if request.travel_preference.is_some() {
            user.travel_preference = request.travel_preference.clone();
        }
        if request.daily_budget.is_some() {
            user.daily_budget = request.daily_budget;
        }

        sqlx::query(
            r#"
            UPDATE user
            SET nickname = ?, health_goal = ?, allergens = ?, weight = ?, height = ?,
                age = ?, gender = ?, travel_preference = ?, daily_budget = ?,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
        "#,
        )
        .bind(&user.nickname)
        .bind(user.health_goal.as_str())
        .bind(serde_json::to_string(&user.allergens)?)
        .bind(user.weight)
        .bind(user.height)
        .bind(user.age)
        .bind(&user.gender)
        .bind(&user.travel_preference)
        .bind(user.daily_budget)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    // === DIET RECORD OPERATIONS ===

    fn row_to_diet_record(row: &sqlx::sqlite::SqliteRow) -> DietRecord {
        DietRecord {
            id: row.get("id"),
            user_id: row.get("user_id"),
            food_name: row.get("food_name"),
            calories: row.get("calories"),
            protein: row.get("protein"),
            fat: row.get("fat"),
            carbs: row.get("carbs"),
            meal_type: row.get("meal_type"),
            record_date: row.get("record_date"),
            created_at: row.get::<Option<String>, _>("created_at").unwrap_or_default(),
        }
    }

    pub async fn add_diet_record(&self, request: &AddDietRecordRequest) -> Result<DietRecord> {
        self.get_user(request.user_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("user {} does not exist", request.user_id)))?;

        validate_record_date(&request.record_date)?;
        let meal_type = normalize_meal_type(&request.meal_type);

        let done = sqlx::query(
            r#"
            INSERT INTO diet_record (user_id, food_name, calories, protein, fat, carbs, meal_type, record_date)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(request.user_id)
        .bind(&request.food_name)
        .bind(request.calories)
        .bind(request.protein.unwrap_or(0.0))
        .bind(request.fat.unwrap_or(0.0))
        .bind(request.carbs.unwrap_or(0.0))
        .bind(meal_type)
        .bind(&request.record_date)
        .execute(&self.pool)
        .await?;

        let record = self
            .get_diet_record(done.last_insert_rowid())
            .await?
            .ok_or_else(|| CoreError::internal("diet record vanished after insert"))?;
        Ok(record)
    }

    pub async fn get_diet_record(&self, record_id: i64) -> Result<Option<DietRecord>> {
        let row = sqlx::query("SELECT * FROM diet_record WHERE id = ?")
            .bind(record_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| Self::row_to_diet_record(&row)))
    }

    /// All records for the user, grouped by date (newest first)
    pub async fn diet_records_by_date(
        &self,
        user_id: i64,
    ) -> Result<BTreeMap<String, Vec<DietRecord>>> {
        let rows = sqlx::query(
            "SELECT * FROM diet_record WHERE user_id = ? ORDER BY record_date DESC, created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: BTreeMap<String, Vec<DietRecord>> = BTreeMap::new();
        for row in rows {
            let record = Self::row_to_diet_record(&row);
            grouped.entry(record.record_date.clone()).or_default().push(record);
        }
        Ok(grouped)
    }

    pub async fn diet_records_on(&self, user_id: i64, date: &str) -> Result<Vec<DietRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM diet_record WHERE user_id = ? AND record_date = ? ORDER BY created_at",
        )
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(Self::row_to_diet_record).collect())
    }

    pub async fn update_diet_record(
        &self,
        record_id: i64,
        request: &UpdateDietRecordRequest,
    ) -> Result<DietRecord> {
        let mut record = self
            .get_diet_record(record_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("diet record {record_id} does not exist")))?;
        if record.user_id != request.user_id {
            return Err(CoreError::permission(
                "only the owner may modify this diet record",
            ));
        }

        if let Some(food_name) = &request.food_name {
            record.food_name = food_name.clone();
        }
        if let Some(calories) = request.calories {
            record.calories = calories;
        }
        if let Some(protein) = request.protein {
            record.protein = protein;
        }
        if let Some(fat) = request.fat {
            record.fat = fat;
        }
        if let Some(carbs) = request.carbs {
            record.carbs = carbs;
        }
        if let Some(meal_type) = &request.meal_type {
            record.meal_type = normalize_meal_type(meal_type);
        }
        if let Some(record_date) = &request.record_date {
            validate_record_date(record_date)?;
            record.record_date = record_date.clone();
        }

        sqlx::query(
            r#"
            UPDATE diet_record
            SET food_name = ?, calories = ?, protein = ?, fat = ?, carbs = ?,
                meal_type = ?, record_date = ?
            WHERE id = ?
        "#,
        )
        .bind(&record.food_name)
        .bind(record.calories)
        .bind(record.protein)
        .bind(record.fat)
        .bind(record.carbs)
        .bind(&record.meal_type)
        .bind(&record.record_date)
        .bind(record_id)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn delete_diet_record(&self, record_id: i64, user_id: i64) -> Result<()> {
        let record = self
            .get_diet_record(record_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("diet record {record_id} does not exist")))?;
        if record.user_id != user_id {
            return Err(CoreError::permission(
                "only the owner may delete this diet record",
            ));
        }
        sqlx::query("DELETE FROM diet_record WHERE id = ?")
            .bind(record_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn today_intake(&self, user_id: i64) -> Result<f64> {
        let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
        let total: Option<f64> = sqlx::query_scalar(
            "SELECT SUM(calories) FROM diet_record WHERE user_id = ? AND record_date = ?",
        )
        .bind(user_id)
        .bind(&today)
        .fetch_one(&self.pool)
        .await?;
        Ok(total.unwrap_or(0.0))
    }

    pub async fn food_history_counts(
        &self,
        user_id: i64,
        days: i64,
    ) -> Result<BTreeMap<String, i64>> {
        let since = (chrono::Local::now().date_naive() - chrono::Duration::days(days))
            .format("%Y-%m-%d")
            .to_string();
        let rows = sqlx::query(
            r#"
            SELECT food_name, COUNT(id) AS cnt
            FROM diet_record
            WHERE user_id = ? AND record_date >= ?
            GROUP BY food_name
        "#,
        )
        .bind(user_id)
        .bind(&since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get::<String, _>("food_name"), row.get::<i64, _>("cnt")))
            .collect())
    }

    pub async fn today_eaten_foods(&self, user_id: i64) -> Result<BTreeSet<String>> {
        let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
        let rows = sqlx::query(
            "SELECT DISTINCT food_name FROM diet_record WHERE user_id = ? AND record_date = ?",
        )
        .bind(user_id)
        .bind(&today)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("food_name"))
            .collect())
    }

    // === MENU RECOGNITION ===

    pub async fn save_menu_recognition(&self, user_id: i64, dishes_json: &str) -> Result<i64> {
        let done = sqlx::query("INSERT INTO menu_recognition (user_id, dishes) VALUES (?, ?)")
            .bind(user_id)
            .bind(dishes_json)
            .execute(&self.pool)
            .await?;
        Ok(done.last_insert_rowid())
    }

    /// Latest recognition for the user (or globally when no user given)
    pub async fn latest_menu_recognition(&self, user_id: Option<i64>) -> Result<Option<String>> {
        let row = if let Some(user_id) = user_id {
            sqlx::query(
                "SELECT dishes FROM menu_recognition WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT 1",
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
        } else {
            sqlx::query("SELECT dishes FROM menu_recognition ORDER BY created_at DESC, id DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?
        };
        Ok(row.map(|row| row.get::<String, _>("dishes")))
    }

    // === TRIP PLAN OPERATIONS ===

    fn row_to_trip_plan(row: &sqlx::sqlite::SqliteRow) -> TripPlan {
        let travelers: Vec<String> = row
            .get::<Option<String>, _>("travelers")
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        TripPlan {
            id: row.get("id"),
            user_id: row.get("user_id"),
            title: row.get("title"),
            destination: row.get("destination"),
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
            start_date: row.get("start_date"),
            end_date: row.get("end_date"),
            travelers,
            status: row.get("status"),
            created_at: row.get::<Option<String>, _>("created_at").unwrap_or_default(),
        }
    }

    fn row_to_trip_item(row: &sqlx::sqlite::SqliteRow) -> TripItem {
        TripItem {
            id: row.get("id"),
            trip_id: row.get("trip_id"),
            day_index: row.get("day_index"),
            start_time: row.get("start_time"),
            place_name: row.get("place_name"),
            place_type: row.get("place_type"),
            duration: row.get("duration"),
            cost: row.get("cost"),
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
            notes: row.get("notes"),
            sort_order: row.get("sort_order"),
        }
    }

    /// Persist a generated plan and its items in one transaction.
    /// Item day indices outside [1, plan span] are rejected.
    pub async fn create_trip_plan(
        &self,
        user_id: i64,
        plan: &GeneratedPlan,
        location: Option<GeoPoint>,
    ) -> Result<(TripPlan, Vec<TripItem>)> {
        let start = validate_date(&plan.start_date)?;
        let end = validate_date(&plan.end_date)?;
        if end < start {
            return Err(CoreError::validation("end date must not precede start date"));
        }
        let span_days = (end - start).num_days() + 1;
        for item in &plan.items {
            if item.day_index < 1 || item.day_index > span_days {
                return Err(CoreError::validation(format!(
                    "item day index {} outside plan span 1..={span_days}",
                    item.day_index
                )));
            }
        }

        let mut tx = self.pool.begin().await?;

        let done = sqlx::query(
            r#"
            INSERT INTO trip_plan (user_id, title, destination, latitude, longitude, start_date, end_date, travelers)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(user_id)
        .bind(&plan.title)
        .bind(&plan.destination)
        .bind(location.map(|l| l.latitude))
        .bind(location.map(|l| l.longitude))
        .bind(&plan.start_date)
        .bind(&plan.end_date)
        .bind(serde_json::to_string(&plan.travelers)?)
        .execute(&mut *tx)
        .await?;
        let trip_id = done.last_insert_rowid();

        for (sort_order, item) in plan.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO trip_item (trip_id, day_index, start_time, place_name, place_type, duration, cost, notes, sort_order)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            )
            .bind(trip_id)
            .bind(item.day_index)
            .bind(&item.start_time)
            .bind(&item.place_name)
            .bind(&item.place_type)
            .bind(item.duration)
            .bind(item.cost)
            .bind(&item.notes)
            .bind(sort_order as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!("Trip plan {trip_id} saved with {} items", plan.items.len());

        let plan = self
            .get_trip_plan(trip_id)
            .await?
            .ok_or_else(|| CoreError::internal("trip plan vanished after insert"))?;
        let items = self.trip_items_of(trip_id).await?;
        Ok((plan, items))
    }

    pub async fn get_trip_plan(&self, trip_id: i64) -> Result<Option<TripPlan>> {
        let row = sqlx::query("SELECT * FROM trip_plan WHERE id = ?")
            .bind(trip_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| Self::row_to_trip_plan(&row)))
    }

    pub async fn list_trip_plans(&self, user_id: i64, limit: i64) -> Result<Vec<TripPlan>> {
        let rows = sqlx::query(
            "SELECT * FROM trip_plan WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(Self::row_to_trip_plan).collect())
    }

    pub async fn trip_items_of(&self, trip_id: i64) -> Result<Vec<TripItem>> {
        let rows = sqlx::query(
            "SELECT * FROM trip_item WHERE trip_id = ? ORDER BY day_index, sort_order, id",
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(Self::row_to_trip_item).collect())
    }

    /// Items of every plan of the user whose date span covers `date`
    pub async fn trip_items_covering(&self, user_id: i64, date: &str) -> Result<Vec<TripItem>> {
        let rows = sqlx::query(
            r#"
            SELECT ti.* FROM trip_item ti
            JOIN trip_plan tp ON ti.trip_id = tp.id
            WHERE tp.user_id = ? AND tp.start_date <= ? AND tp.end_date >= ?
            ORDER BY ti.trip_id, ti.day_index, ti.sort_order
        "#,
        )
        .bind(user_id)
        .bind(date)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(Self::row_to_trip_item).collect())
    }

    /// Summed planned cost and duration over a plan's items
    pub async fn plan_totals(&self, trip_id: i64) -> Result<(f64, i64)> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(cost), 0.0) AS cost, COALESCE(SUM(duration), 0) AS duration FROM trip_item WHERE trip_id = ?",
        )
        .bind(trip_id)
        .fetch_one(&self.pool)
        .await?;
        Ok((row.get::<f64, _>("cost"), row.get::<i64, _>("duration")))
    }

    // === EXERCISE RECORD OPERATIONS ===

    fn row_to_exercise_record(row: &sqlx::sqlite::SqliteRow) -> ExerciseRecord {
        ExerciseRecord {
            id: row.get("id"),
            user_id: row.get("user_id"),
            plan_id: row.get("plan_id"),
            exercise_type: row.get("exercise_type"),
            actual_calories: row.get("actual_calories"),
            actual_duration: row.get("actual_duration"),
            distance: row.get("distance"),
            route_data: row.get("route_data"),
            planned_calories: row.get("planned_calories"),
            planned_duration: row.get("planned_duration"),
            exercise_date: row.get("exercise_date"),
            started_at: row.get("started_at"),
            ended_at: row.get("ended_at"),
            notes: row.get("notes"),
            created_at: row.get::<Option<String>, _>("created_at").unwrap_or_default(),
        }
    }

    pub async fn create_exercise_record(
        &self,
        request: &CreateExerciseRecordRequest,
    ) -> Result<ExerciseRecord> {
        self.get_user(request.user_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("user {} does not exist", request.user_id)))?;

        if !is_valid_exercise_type(&request.exercise_type) {
            return Err(CoreError::validation(format!(
                "unsupported exercise type: {}, expected one of {}",
                request.exercise_type,
                VALID_EXERCISE_TYPES.join(", ")
            )));
        }
        if request.actual_calories < 0.0 {
            return Err(CoreError::validation("actual calories must be >= 0"));
        }
        if request.actual_duration < 1 {
            return Err(CoreError::validation("actual duration must be >= 1 minute"));
        }
        validate_date(&request.exercise_date)?;

        if let (Some(started), Some(ended)) = (&request.started_at, &request.ended_at) {
            if ended <= started {
                return Err(CoreError::validation("end time must be after start time"));
            }
        }

        // Linked plan: enforce ownership and copy planned totals when the
        // caller did not supply them.
        let mut planned_calories = request.planned_calories;
        let mut planned_duration = request.planned_duration;
        if let Some(plan_id) = request.plan_id {
            let plan = self
                .get_trip_plan(plan_id)
                .await?
                .ok_or_else(|| CoreError::not_found(format!("trip plan {plan_id} does not exist")))?;
            if plan.user_id != request.user_id {
                return Err(CoreError::permission(
                    "only the owner may link this exercise plan",
                ));
            }
            if planned_calories.is_none() || planned_duration.is_none() {
                let (cost, duration) = self.plan_totals(plan_id).await?;
                planned_calories = planned_calories.or(Some(cost));
                planned_duration = planned_duration.or(Some(duration));
            }
        }

        let done = sqlx::query(
            r#"
            INSERT INTO exercise_record
            (user_id, plan_id, exercise_type, actual_calories, actual_duration, distance,
             route_data, planned_calories, planned_duration, exercise_date, started_at, ended_at, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(request.user_id)
        .bind(request.plan_id)
        .bind(&request.exercise_type)
        .bind(request.actual_calories)
        .bind(request.actual_duration)
        .bind(request.distance)
        .bind(&request.route_data)
        .bind(planned_calories)
        .bind(planned_duration)
        .bind(&request.exercise_date)
        .bind(&request.started_at)
        .bind(&request.ended_at)
        .bind(&request.notes)
        .execute(&self.pool)
        .await?;

        let record = self
            .get_exercise_record(done.last_insert_rowid())
            .await?
            .ok_or_else(|| CoreError::internal("exercise record vanished after insert"))?;
        Ok(record)
    }

    pub async fn get_exercise_record(&self, record_id: i64) -> Result<Option<ExerciseRecord>> {
        let row = sqlx::query("SELECT * FROM exercise_record WHERE id = ?")
            .bind(record_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| Self::row_to_exercise_record(&row)))
    }

    pub async fn list_exercise_records(
        &self,
        user_id: i64,
        exercise_date: Option<&str>,
        exercise_type: Option<&str>,
        plan_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<ExerciseRecord>)> {
        let mut conditions = vec!["user_id = ?".to_string()];
        if exercise_date.is_some() {
            conditions.push("exercise_date = ?".to_string());
        }
        if exercise_type.is_some() {
            conditions.push("exercise_type = ?".to_string());
        }
        if plan_id.is_some() {
            conditions.push("plan_id = ?".to_string());
        }
        let where_clause = conditions.join(" AND ");

        let count_sql = format!("SELECT COUNT(*) FROM exercise_record WHERE {where_clause}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(user_id);
        if let Some(date) = exercise_date {
            count_query = count_query.bind(date);
        }
        if let Some(ty) = exercise_type {
            count_query = count_query.bind(ty);
        }
        if let Some(plan) = plan_id {
            count_query = count_query.bind(plan);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let list_sql = format!(
            "SELECT * FROM exercise_record WHERE {where_clause} ORDER BY exercise_date DESC, created_at DESC LIMIT ? OFFSET ?"
        );
        let mut list_query = sqlx::query(&list_sql).bind(user_id);
        if let Some(date) = exercise_date {
            list_query = list_query.bind(date);
        }
        if let Some(ty) = exercise_type {
            list_query = list_query.bind(ty);
        }
        if let Some(plan) = plan_id {
            list_query = list_query.bind(plan);
        }
        let rows = list_query.bind(limit).bind(offset).fetch_all(&self.pool).await?;

        Ok((total, rows.iter().map(Self::row_to_exercise_record).collect()))
    }

    pub async fn delete_exercise_record(&self, record_id: i64, user_id: i64) -> Result<()> {
        let record = self
            .get_exercise_record(record_id)
            .await?
            .ok_or_else(|| {
                CoreError::not_found(format!("exercise record {record_id} does not exist"))
            })?;
        if record.user_id != user_id {
            return Err(CoreError::permission(
                "only the owner may delete this exercise record",
            ));
        }
        sqlx::query("DELETE FROM exercise_record WHERE id = ?")
            .bind(record_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn exercise_records_on(&self, user_id: i64, date: &str) -> Result<Vec<ExerciseRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM exercise_record WHERE user_id = ? AND exercise_date = ? ORDER BY created_at",
        )
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(Self::row_to_exercise_record).collect())
    }

    pub async fn exercise_records_between(
        &self,
        user_id: i64,
        start_date: &str,
        end_date: &str,
    ) -> Result<Vec<ExerciseRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM exercise_record
            WHERE user_id = ? AND exercise_date >= ? AND exercise_date <= ?
            ORDER BY exercise_date, created_at
        "#,
        )
        .bind(user_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(Self::row_to_exercise_record).collect())
    }

    // === MEAL COMPARISON OPERATIONS ===

    fn row_to_meal_comparison(row: &sqlx::sqlite::SqliteRow) -> MealComparison {
        MealComparison {
            id: row.get("id"),
            user_id: row.get("user_id"),
            before_image_url: row.get("before_image_url"),
            before_features: row.get("before_features"),
            after_image_url: row.get("after_image_url"),
            after_features: row.get("after_features"),
            consumption_ratio: row.get("consumption_ratio"),
            original_calories: row.get("original_calories"),
            original_protein: row.get("original_protein"),
            original_fat: row.get("original_fat"),
            original_carbs: row.get("original_carbs"),
            net_calories: row.get("net_calories"),
            net_protein: row.get("net_protein"),
            net_fat: row.get("net_fat"),
            net_carbs: row.get("net_carbs"),
            status: ComparisonStatus::parse(&row.get::<String, _>("status")),
            comparison_analysis: row.get("comparison_analysis"),
            created_at: row.get::<Option<String>, _>("created_at").unwrap_or_default(),
        }
    }

    pub async fn create_meal_comparison(
        &self,
        user_id: i64,
        before_image_url: &str,
        before_features_json: &str,
        features: &BeforeFeatures,
    ) -> Result<MealComparison> {
        let done = sqlx::query(
            r#"
            INSERT INTO meal_comparison
            (user_id, before_image_url, before_features, original_calories, original_protein,
             original_fat, original_carbs, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, 'pending_after')
        "#,
        )
        .bind(user_id)
        .bind(before_image_url)
        .bind(before_features_json)
        .bind(features.total_estimated_calories)
        .bind(features.total_estimated_protein)
        .bind(features.total_estimated_fat)
        .bind(features.total_estimated_carbs)
        .execute(&self.pool)
        .await?;

        self.get_meal_comparison(done.last_insert_rowid())
            .await?
            .ok_or_else(|| CoreError::internal("meal comparison vanished after insert"))
    }

    pub async fn get_meal_comparison(&self, id: i64) -> Result<Option<MealComparison>> {
        let row = sqlx::query("SELECT * FROM meal_comparison WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| Self::row_to_meal_comparison(&row)))
    }

    pub async fn complete_meal_comparison(
        &self,
        id: i64,
        after_image_url: &str,
        after_features_json: &str,
        after: &AfterFeatures,
    ) -> Result<MealComparison> {
        let record = self
            .get_meal_comparison(id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("meal comparison {id} does not exist")))?;

        let ratio = after.consumption_ratio.clamp(0.0, 1.0);
        let net = |original: Option<f64>| original.map(|v| round2(v * ratio));

        sqlx::query(
            r#"
            UPDATE meal_comparison
            SET after_image_url = ?, after_features = ?, consumption_ratio = ?,
                net_calories = ?, net_protein = ?, net_fat = ?, net_carbs = ?,
                status = 'completed', comparison_analysis = ?
            WHERE id = ?
        "#,
        )
        .bind(after_image_url)
        .bind(after_features_json)
        .bind(ratio)
        .bind(net(record.original_calories))
        .bind(net(record.original_protein))
        .bind(net(record.original_fat))
        .bind(net(record.original_carbs))
        .bind(&after.comparison_analysis)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_meal_comparison(id)
            .await?
            .ok_or_else(|| CoreError::internal("meal comparison vanished after update"))
    }

    /// Deterministic net recomputation from a manually supplied ratio
    pub async fn adjust_meal_ratio(&self, id: i64, ratio: f64) -> Result<MealComparison> {
        let record = self
            .get_meal_comparison(id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("meal comparison {id} does not exist")))?;

        let ratio = ratio.clamp(0.0, 1.0);
        let net = |original: Option<f64>| original.map(|v| round2(v * ratio));

        sqlx::query(
            r#"
            UPDATE meal_comparison
            SET consumption_ratio = ?, net_calories = ?, net_protein = ?, net_fat = ?, net_carbs = ?
            WHERE id = ?
        "#,
        )
        .bind(ratio)
        .bind(net(record.original_calories))
        .bind(net(record.original_protein))
        .bind(net(record.original_fat))
        .bind(net(record.original_carbs))
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_meal_comparison(id)
            .await?
            .ok_or_else(|| CoreError::internal("meal comparison vanished after update"))
    }

    // === FORGET ME ===

    /// Delete the user and every dependent row in one transaction, in
    /// dependency order. Returns per-table deleted counts.
    pub async fn forget_me(&self, user_id: i64) -> Result<(BTreeMap<String, i64>, i64)> {
        self.get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("user {user_id} does not exist")))?;

        let mut tx = self.pool.begin().await?;
        let mut deleted: BTreeMap<String, i64> = BTreeMap::new();

        let exercise = sqlx::query("DELETE FROM exercise_record WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        deleted.insert("exercise_records".to_string(), exercise.rows_affected() as i64);

        let items = sqlx::query(
            "DELETE FROM trip_item WHERE trip_id IN (SELECT id FROM trip_plan WHERE user_id = ?)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        deleted.insert("trip_items".to_string(), items.rows_affected() as i64);

        let plans = sqlx::query("DELETE FROM trip_plan WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        deleted.insert("trip_plans".to_string(), plans.rows_affected() as i64);

        let diet = sqlx::query("DELETE FROM diet_record WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        deleted.insert("diet_records".to_string(), diet.rows_affected() as i64);

        let meals = sqlx::query("DELETE FROM meal_comparison WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        deleted.insert("meal_comparisons".to_string(), meals.rows_affected() as i64);

        let menus = sqlx::query("DELETE FROM menu_recognition WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        deleted.insert("menu_recognitions".to_string(), menus.rows_affected() as i64);

        let user = sqlx::query("DELETE FROM user WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        deleted.insert("user".to_string(), user.rows_affected() as i64);

        tx.commit().await?;

        let total = deleted.values().sum();
        info!("Forget-me completed for user {user_id}, {total} rows deleted");
        Ok((deleted, total))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn validate_date(value: &str) -> Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| CoreError::validation(format!("invalid date {value}, expected YYYY-MM-DD")))
}

/// Diet records may be backfilled freely but not logged far into the
/// future (one year horizon).
fn validate_record_date(value: &str) -> Result<chrono::NaiveDate> {
    let date = validate_date(value)?;
    let horizon = chrono::Local::now().date_naive() + chrono::Duration::days(366);
    if date > horizon {
        return Err(CoreError::validation(format!(
            "record date {value} is too far in the future"
        )));
    }
    Ok(date)
}
