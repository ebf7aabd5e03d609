//! HTML dashboard report
//!
//! A static page with the dashboard aggregates, grouped counts and the
//! pending summary, rendered with tera.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};

use crate::backup::TIMESTAMP_FORMAT;
use crate::error::{Error, Result};
use crate::readmodel::{ActionRow, DashboardStats, GroupCount, IncidentRow};

/// File name prefix of rendered reports
pub const REPORT_PREFIX: &str = "informe_";

const REPORT_TEMPLATE: &str = "report.html";

/// One titled block of grouped counts
#[derive(Debug, Clone, Serialize)]
pub struct GroupSection {
    pub title: String,
    pub counts: Vec<GroupCount>,
}

/// Everything the report template renders
#[derive(Debug, Clone, Serialize)]
pub struct ReportData {
    pub generated_at: NaiveDateTime,
    pub backend: String,
    pub stats: DashboardStats,
    pub groups: Vec<GroupSection>,
    pub pending: Vec<IncidentRow>,
    pub recent_actions: Vec<ActionRow>,
}

/// Template engine wrapper
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Engine with the built-in report template registered
    pub fn new() -> Result<Self> {
        let mut engine = Self::empty();
        engine.add_template(REPORT_TEMPLATE, Self::report_template())?;
        Ok(engine)
    }

    /// Create an empty template engine
    pub fn empty() -> Self {
        let mut tera = Tera::default();
        tera.register_filter("status_class", status_class_filter);
        Self { tera }
    }

    /// Add a template from a string
    pub fn add_template(&mut self, name: &str, content: &str) -> Result<()> {
        self.tera.add_raw_template(name, content)?;
        Ok(())
    }

    pub fn render(&self, template_name: &str, data: &ReportData) -> Result<String> {
        let context = Context::from_serialize(data)?;
        Ok(self.tera.render(template_name, &context)?)
    }

    pub fn render_report(&self, data: &ReportData) -> Result<String> {
        self.render(REPORT_TEMPLATE, data)
    }

    /// Write `informe_<timestamp>.html` into `dir`
    pub fn write_report(&self, dir: &Path, data: &ReportData) -> Result<PathBuf> {
        let html = self.render_report(data)?;
        std::fs::create_dir_all(dir).map_err(|source| Error::FileWriteError {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(format!(
            "{}{}.html",
            REPORT_PREFIX,
            Local::now().format(TIMESTAMP_FORMAT)
        ));
        std::fs::write(&path, html).map_err(|source| Error::FileWriteError {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Wrote HTML report");
        Ok(path)
    }

    /// The built-in dashboard report
    pub fn report_template() -> &'static str {
        r#"<!DOCTYPE html>
<html lang="es">
<head>
    <meta charset="utf-8">
    <title>Informe de incidencias</title>
    <style>
        body { font-family: system-ui, sans-serif; max-width: 1100px; margin: 2rem auto; padding: 0 1rem; }
        .meta { color: #666; font-size: 0.9rem; }
        .cards { display: flex; gap: 1rem; margin: 1.5rem 0; }
        .card { flex: 1; border: 1px solid #eee; border-radius: 6px; padding: 1rem; text-align: center; }
        .card strong { display: block; font-size: 2rem; }
        .groups { display: grid; grid-template-columns: repeat(auto-fill, minmax(300px, 1fr)); gap: 1rem; }
        table { border-collapse: collapse; width: 100%; margin-bottom: 1.5rem; }
        th, td { text-align: left; padding: 0.4rem 0.6rem; border-bottom: 1px solid #eee; }
        th { background: #fafafa; }
        .status { font-size: 0.8rem; padding: 0.2rem 0.5rem; border-radius: 4px; }
        .status-pending { background: #fff3e0; color: #e65100; }
        .status-progress { background: #e3f2fd; color: #1565c0; }
        .status-resolved { background: #e8f5e9; color: #2e7d32; }
        .status-other { background: #f3e5f5; color: #6a1b9a; }
    </style>
</head>
<body>
    <h1>Informe de incidencias</h1>
    <p class="meta">Generado {{ generated_at }} · origen {{ backend }}</p>

    <div class="cards">
        <div class="card"><strong>{{ stats.total_incidents }}</strong>Total</div>
        <div class="card"><strong>{{ stats.pending_incidents }}</strong>Pendientes</div>
        <div class="card"><strong>{{ stats.resolved_incidents }}</strong>Resueltas</div>
        <div class="card"><strong>{{ stats.recent_incidents }}</strong>Últimos 7 días</div>
    </div>

    <h2>Por estado</h2>
    <table>
        <tr><th>Estado</th><th>Total</th></tr>
        {% for group in stats.by_status %}
        <tr><td><span class="status {{ group.value | status_class }}">{{ group.value }}</span></td><td>{{ group.count }}</td></tr>
        {% endfor %}
    </table>

    <div class="groups">
    {% for section in groups %}
        <section>
            <h3>{{ section.title }}</h3>
            <table>
                {% for group in section.counts %}
                <tr><td>{{ group.value }}</td><td>{{ group.count }}</td></tr>
                {% endfor %}
                {% if section.counts | length == 0 %}<tr><td colspan="2">Sin datos</td></tr>{% endif %}
            </table>
        </section>
    {% endfor %}
    </div>

    <h2>Incidencias pendientes</h2>
    <table>
        <tr><th>ID</th><th>Fecha</th><th>Bodega</th><th>Zona</th><th>Verificador</th><th>Tipo</th><th>Asignado</th><th>Estado</th><th>Responsable</th></tr>
        {% for row in pending %}
        <tr>
            <td>{{ row.id }}</td>
            <td>{{ row.date }}</td>
            <td>{{ row.warehouse }}</td>
            <td>{{ row.warehouse_zone }}</td>
            <td>{{ row.causing_verifier }}</td>
            <td>{{ row.incident_type }}</td>
            <td>{{ row.assigned_coordinator }}</td>
            <td><span class="status {{ row.status | status_class }}">{{ row.status }}</span></td>
            <td>{{ row.responsible }}</td>
        </tr>
        {% endfor %}
        {% if pending | length == 0 %}<tr><td colspan="9">No hay incidencias pendientes</td></tr>{% endif %}
    </table>

    <h2>Acciones recientes</h2>
    <table>
        <tr><th>Fecha</th><th>Registro</th><th>Acción</th><th>Nuevo estado</th><th>Realizado por</th><th>Bodega</th></tr>
        {% for action in recent_actions %}
        <tr>
            <td>{{ action.action_date }}</td>
            <td>{{ action.incident_record_id }}</td>
            <td>{{ action.action_description }}</td>
            <td>{% if action.new_status %}{{ action.new_status }}{% endif %}</td>
            <td>{{ action.performed_by }}</td>
            <td>{{ action.warehouse }}</td>
        </tr>
        {% endfor %}
    </table>
</body>
</html>"#
    }
}

/// Tera filter mapping a status label to its CSS class
fn status_class_filter(value: &tera::Value, _args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
    let class = match value.as_str().and_then(|s| s.parse::<crate::model::Status>().ok()) {
        Some(crate::model::Status::Pendiente) => "status-pending",
        Some(crate::model::Status::EnProceso) => "status-progress",
        Some(crate::model::Status::Solucionado) => "status-resolved",
        _ => "status-other",
    };
    Ok(tera::Value::String(class.to_string()))
}
