//! Schema provisioning for both geometry layouts.
//!
//! [`SchemaPlan`] is the pure description of every DDL statement for a given
//! set of [`Capabilities`]; [`SchemaProvisioner`] executes it. All statements
//! are create-if-absent (`IF NOT EXISTS`, `CREATE OR REPLACE`, or a guarded
//! `DO` block for triggers), so running the plan twice changes nothing.
//!
//! Failure policy: functions, tables and triggers are required and abort with
//! [`Error::Provisioning`]. Indexes only affect performance, so a failed index
//! is recorded as a warning in the [`ProvisioningReport`].

use std::time::Instant;

use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use atlas_core::{
    defaults, AssetType, Capabilities, ClaimStatus, ClaimantType, Error, GeometryMode, Result,
    UserRole,
};

/// Trigger function that stamps `updated_at`.
const TOUCH_FUNCTION: &str = "atlas_touch_updated_at";

/// Trigger function that derives the village centroid (native mode only).
const CENTROID_FUNCTION: &str = "atlas_village_centroid";

/// Tables in dependency order.
pub const TABLES: [&str; 5] = ["villages", "users", "claimants", "micro_assets", "documents"];

/// A named DDL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub name: String,
    pub sql: String,
}

impl Statement {
    fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// An index with an optional substitute tried when it cannot be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub sql: String,
    pub substitute: Option<Box<IndexSpec>>,
}

impl IndexSpec {
    fn new(name: &str, table: &str, using: &str) -> Self {
        Self {
            name: name.to_string(),
            sql: format!("CREATE INDEX IF NOT EXISTS {} ON {} {}", name, table, using),
            substitute: None,
        }
    }

    fn or_else(mut self, substitute: IndexSpec) -> Self {
        self.substitute = Some(Box::new(substitute));
        self
    }
}

/// Every DDL statement for one geometry mode, in execution order.
#[derive(Debug, Clone)]
pub struct SchemaPlan {
    pub mode: GeometryMode,
    pub functions: Vec<Statement>,
    pub tables: Vec<Statement>,
    pub triggers: Vec<Statement>,
    pub indexes: Vec<IndexSpec>,
}

impl SchemaPlan {
    /// Build the plan selected by the probed capabilities.
    pub fn for_capabilities(caps: &Capabilities) -> Self {
        let mode = caps.geometry_mode();

        let mut functions = vec![Statement::new(
            TOUCH_FUNCTION,
            format!(
                r#"CREATE OR REPLACE FUNCTION {}() RETURNS trigger AS $$
BEGIN
    NEW.updated_at := NOW();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql"#,
                TOUCH_FUNCTION
            ),
        )];
        if mode == GeometryMode::Native {
            functions.push(Statement::new(
                CENTROID_FUNCTION,
                format!(
                    r#"CREATE OR REPLACE FUNCTION {}() RETURNS trigger AS $$
BEGIN
    IF NEW.boundary IS NULL THEN
        NEW.centroid := NULL;
    ELSE
        NEW.centroid := ST_Centroid(NEW.boundary);
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql"#,
                    CENTROID_FUNCTION
                ),
            ));
        }

        let tables = vec![
            Statement::new("villages", villages_table(mode)),
            Statement::new("users", users_table()),
            Statement::new("claimants", claimants_table(mode)),
            Statement::new("micro_assets", micro_assets_table(mode)),
            Statement::new("documents", documents_table()),
        ];

        let mut triggers = Vec::new();
        if mode == GeometryMode::Native {
            triggers.push(guarded_trigger(
                "trg_villages_centroid",
                "villages",
                "BEFORE INSERT OR UPDATE",
                CENTROID_FUNCTION,
            ));
        }
        for table in ["villages", "users", "claimants", "micro_assets"] {
            triggers.push(guarded_trigger(
                &format!("trg_{}_updated_at", table),
                table,
                "BEFORE UPDATE",
                TOUCH_FUNCTION,
            ));
        }

        let mut indexes = spatial_indexes(mode);
        indexes.push(village_name_index(caps.trigram));
        indexes.extend(common_indexes());

        Self {
            mode,
            functions,
            tables,
            triggers,
            indexes,
        }
    }
}

fn check_list<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    values
        .into_iter()
        .map(|v| format!("'{}'", v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Geometry column definitions for a spatial table.
fn geometry_columns(mode: GeometryMode, column: &str, with_point_centroid: bool) -> String {
    match mode {
        GeometryMode::Native if with_point_centroid => format!(
            "{col} geometry(Geometry, {srid}),\n    centroid geometry(Point, {srid}),",
            col = column,
            srid = defaults::SRID
        ),
        GeometryMode::Native => format!(
            "{col} geometry(Geometry, {srid}),",
            col = column,
            srid = defaults::SRID
        ),
        GeometryMode::Fallback => format!(
            "{} JSONB,\n    centroid_lat DOUBLE PRECISION,\n    centroid_lon DOUBLE PRECISION,",
            column
        ),
    }
}

fn villages_table(mode: GeometryMode) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS villages (
    id BIGSERIAL PRIMARY KEY,
    uid UUID NOT NULL UNIQUE DEFAULT gen_random_uuid(),
    external_id TEXT UNIQUE,
    name TEXT NOT NULL,
    state TEXT,
    district TEXT,
    block TEXT,
    properties JSONB NOT NULL DEFAULT '{{}}'::jsonb,
    {}
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#,
        geometry_columns(mode, "boundary", true)
    )
}

fn users_table() -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    uid UUID NOT NULL UNIQUE DEFAULT gen_random_uuid(),
    username TEXT NOT NULL UNIQUE,
    display_name TEXT,
    email TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL DEFAULT '{}' CHECK (role IN ({})),
    password_hash TEXT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#,
        UserRole::default().as_str(),
        check_list(UserRole::ALL.iter().map(|r| r.as_str()))
    )
}

fn claimants_table(mode: GeometryMode) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS claimants (
    id BIGSERIAL PRIMARY KEY,
    uid UUID NOT NULL UNIQUE DEFAULT gen_random_uuid(),
    external_id TEXT UNIQUE,
    name TEXT NOT NULL,
    claimant_type TEXT NOT NULL CHECK (claimant_type IN ({})),
    tribal_group TEXT,
    village_id BIGINT REFERENCES villages(id) ON DELETE SET NULL,
    area_ha NUMERIC(14, 4) CHECK (area_ha IS NULL OR area_ha >= 0),
    status TEXT NOT NULL DEFAULT '{}' CHECK (status IN ({})),
    properties JSONB NOT NULL DEFAULT '{{}}'::jsonb,
    {}
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#,
        check_list(ClaimantType::ALL.iter().map(|t| t.as_str())),
        ClaimStatus::default().as_str(),
        check_list(ClaimStatus::ALL.iter().map(|s| s.as_str())),
        geometry_columns(mode, "geom", false)
    )
}

fn micro_assets_table(mode: GeometryMode) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS micro_assets (
    id BIGSERIAL PRIMARY KEY,
    uid UUID NOT NULL UNIQUE DEFAULT gen_random_uuid(),
    external_id TEXT UNIQUE,
    name TEXT,
    asset_type TEXT NOT NULL CHECK (asset_type IN ({})),
    village_id BIGINT REFERENCES villages(id) ON DELETE SET NULL,
    district TEXT,
    area_ha NUMERIC(14, 4) CHECK (area_ha IS NULL OR area_ha >= 0),
    status TEXT NOT NULL DEFAULT '{}',
    properties JSONB NOT NULL DEFAULT '{{}}'::jsonb,
    {}
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#,
        check_list(AssetType::ALL.iter().map(|t| t.as_str())),
        defaults::MICRO_ASSET_STATUS,
        geometry_columns(mode, "geom", false)
    )
}

fn documents_table() -> String {
    r#"CREATE TABLE IF NOT EXISTS documents (
    id BIGSERIAL PRIMARY KEY,
    uid UUID NOT NULL UNIQUE DEFAULT gen_random_uuid(),
    external_id TEXT UNIQUE,
    claimant_id BIGINT REFERENCES claimants(id) ON DELETE SET NULL,
    filename TEXT,
    file_path TEXT,
    raw_text TEXT,
    structured JSONB NOT NULL DEFAULT '{}'::jsonb,
    ocr_confidence DOUBLE PRECISION CHECK (ocr_confidence IS NULL OR (ocr_confidence >= 0 AND ocr_confidence <= 1)),
    uploaded_by TEXT,
    uploaded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#
    .to_string()
}

/// `CREATE TRIGGER` has no `IF NOT EXISTS`; guard it on `pg_trigger`.
fn guarded_trigger(name: &str, table: &str, timing: &str, function: &str) -> Statement {
    Statement::new(
        name,
        format!(
            r#"DO $$
BEGIN
    IF NOT EXISTS (
        SELECT 1 FROM pg_trigger
        WHERE tgname = '{name}' AND tgrelid = '{table}'::regclass
    ) THEN
        CREATE TRIGGER {name} {timing} ON {table}
            FOR EACH ROW EXECUTE FUNCTION {function}();
    END IF;
END
$$"#,
            name = name,
            table = table,
            timing = timing,
            function = function
        ),
    )
}

fn spatial_indexes(mode: GeometryMode) -> Vec<IndexSpec> {
    match mode {
        GeometryMode::Native => vec![
            IndexSpec::new("idx_villages_boundary", "villages", "USING GIST (boundary)"),
            IndexSpec::new("idx_villages_centroid", "villages", "USING GIST (centroid)"),
            IndexSpec::new("idx_claimants_geom", "claimants", "USING GIST (geom)"),
            IndexSpec::new("idx_micro_assets_geom", "micro_assets", "USING GIST (geom)"),
        ],
        GeometryMode::Fallback => {
            let mut indexes = vec![
                IndexSpec::new("idx_villages_boundary", "villages", "USING GIN (boundary)"),
                IndexSpec::new("idx_claimants_geom", "claimants", "USING GIN (geom)"),
                IndexSpec::new("idx_micro_assets_geom", "micro_assets", "USING GIN (geom)"),
            ];
            for table in ["villages", "claimants", "micro_assets"] {
                for column in ["centroid_lat", "centroid_lon"] {
                    indexes.push(IndexSpec::new(
                        &format!("idx_{}_{}", table, column),
                        table,
                        &format!("({})", column),
                    ));
                }
            }
            indexes
        }
    }
}

fn village_name_index(trigram: bool) -> IndexSpec {
    let plain = IndexSpec::new("idx_villages_name", "villages", "(name)");
    if trigram {
        IndexSpec::new(
            "idx_villages_name_trgm",
            "villages",
            "USING GIN (name gin_trgm_ops)",
        )
        .or_else(plain)
    } else {
        plain
    }
}

fn common_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::new("idx_villages_district_name", "villages", "(district, name)"),
        IndexSpec::new("idx_claimants_village_id", "claimants", "(village_id)"),
        IndexSpec::new("idx_claimants_status", "claimants", "(status)"),
        IndexSpec::new("idx_claimants_type", "claimants", "(claimant_type)"),
        IndexSpec::new("idx_micro_assets_village_id", "micro_assets", "(village_id)"),
        IndexSpec::new("idx_micro_assets_type", "micro_assets", "(asset_type)"),
        IndexSpec::new("idx_micro_assets_status", "micro_assets", "(status)"),
        IndexSpec::new("idx_documents_claimant_id", "documents", "(claimant_id)"),
        IndexSpec::new("idx_users_role", "users", "(role)"),
    ]
}

/// Map the stored type of `villages.boundary` to the layout it belongs to.
fn layout_from_udt(udt_name: &str) -> Option<GeometryMode> {
    match udt_name {
        "geometry" => Some(GeometryMode::Native),
        "jsonb" => Some(GeometryMode::Fallback),
        _ => None,
    }
}

/// Outcome of a provisioning run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProvisioningReport {
    pub geometry_mode: Option<GeometryMode>,
    pub tables: Vec<String>,
    pub triggers: Vec<String>,
    pub indexes: Vec<String>,
    /// Indexes replaced by their plain substitute.
    pub substituted: Vec<String>,
    /// Indexes that could not be created at all.
    pub index_warnings: Vec<String>,
}

/// Creates the table set for the probed geometry mode.
pub struct SchemaProvisioner {
    pool: PgPool,
    capabilities: Capabilities,
}

impl SchemaProvisioner {
    pub fn new(pool: PgPool, capabilities: Capabilities) -> Self {
        Self { pool, capabilities }
    }

    pub fn plan(&self) -> SchemaPlan {
        SchemaPlan::for_capabilities(&self.capabilities)
    }

    /// Create (or confirm) the whole schema.
    pub async fn initialize_schema(&self) -> Result<ProvisioningReport> {
        let start = Instant::now();
        let plan = self.plan();
        let mut report = ProvisioningReport {
            geometry_mode: Some(plan.mode),
            ..Default::default()
        };

        self.check_existing_layout(plan.mode).await?;

        for statement in plan.functions.iter().chain(&plan.tables) {
            self.execute_required(statement).await?;
            if TABLES.contains(&statement.name.as_str()) {
                report.tables.push(statement.name.clone());
            }
        }
        for statement in &plan.triggers {
            self.execute_required(statement).await?;
            report.triggers.push(statement.name.clone());
        }
        for index in &plan.indexes {
            self.create_index(index, &mut report).await;
        }

        info!(
            subsystem = "db",
            component = "schema",
            op = "initialize_schema",
            geometry_mode = %plan.mode,
            tables = report.tables.len(),
            triggers = report.triggers.len(),
            indexes = report.indexes.len(),
            index_warnings = report.index_warnings.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Schema provisioned"
        );

        Ok(report)
    }

    /// Refuse to provision over tables built for the other layout.
    async fn check_existing_layout(&self, mode: GeometryMode) -> Result<()> {
        let udt: Option<String> = sqlx::query_scalar(
            r#"
            SELECT udt_name::text
            FROM information_schema.columns
            WHERE table_schema = current_schema()
              AND table_name = 'villages'
              AND column_name = 'boundary'
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Provisioning(format!("inspecting existing schema: {}", e)))?;

        match udt.as_deref().and_then(layout_from_udt) {
            Some(existing) if existing != mode => Err(Error::Provisioning(format!(
                "existing tables use the {} geometry layout but the store now selects {}",
                existing, mode
            ))),
            _ => Ok(()),
        }
    }

    async fn execute_required(&self, statement: &Statement) -> Result<()> {
        sqlx::query(&statement.sql)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Provisioning(format!("{}: {}", statement.name, e)))?;
        debug!(
            subsystem = "db",
            component = "schema",
            object = %statement.name,
            "Schema object ensured"
        );
        Ok(())
    }

    async fn create_index(&self, index: &IndexSpec, report: &mut ProvisioningReport) {
        let mut candidate = Some(index);
        while let Some(spec) = candidate {
            match sqlx::query(&spec.sql).execute(&self.pool).await {
                Ok(_) => {
                    if spec.name != index.name {
                        report.substituted.push(index.name.clone());
                    }
                    report.indexes.push(spec.name.clone());
                    return;
                }
                Err(e) => {
                    warn!(
                        subsystem = "db",
                        component = "schema",
                        index = %spec.name,
                        error = %e,
                        "Index creation failed"
                    );
                    candidate = spec.substitute.as_deref();
                }
            }
        }
        report.index_warnings.push(index.name.clone());
    }
}
