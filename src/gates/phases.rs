//! The per-phase completion validators.
//!
//! Each validator walks the artifact tree for one phase and returns every
//! defect it can find. Defect strings are stable; operators grep for them.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use super::checks::{self, DocParser};

/// Phase 1: architect and planner outputs.
pub(super) fn analysis_planning(root: &Path, parser: &dyn DocParser) -> Result<Vec<String>> {
    let mut defects = Vec::new();
    let architect = root.join("agents").join("architect").join("output");
    let planner = root.join("agents").join("planner").join("output");

    let arch_doc = architect.join("architecture.md");
    if !arch_doc.exists() {
        defects.push("Missing: agents/architect/output/architecture.md".to_string());
    } else if checks::file_smaller_than(&arch_doc, 1000)? {
        defects.push("Architecture document too short (< 1KB)".to_string());
    }

    let api_spec = architect.join("api.openapi.yaml");
    if !api_spec.exists() {
        defects.push("Missing: agents/architect/output/api.openapi.yaml".to_string());
    } else if parser.available() {
        match fs::read_to_string(&api_spec) {
            Ok(raw) => match parser.parse_yaml(&raw) {
                Ok(doc) => {
                    if doc.get("openapi").is_none() {
                        defects.push("OpenAPI spec missing 'openapi' version field".to_string());
                    }
                    if doc.get("info").is_none() {
                        defects.push("OpenAPI spec missing 'info' section".to_string());
                    }
                    if !doc.get("paths").map(checks::is_truthy).unwrap_or(false) {
                        defects.push("OpenAPI spec has no paths defined".to_string());
                    }
                }
                Err(e) => defects.push(format!("Invalid YAML in OpenAPI spec: {}", e)),
            },
            Err(e) => defects.push(format!("Error reading OpenAPI spec: {}", e)),
        }
    } else if checks::file_smaller_than(&api_spec, 500)? {
        defects.push("OpenAPI spec file too small (< 500 bytes)".to_string());
    }

    let schema = architect.join("database_schema.prisma");
    if !schema.exists() {
        defects.push("Missing: agents/architect/output/database_schema.prisma".to_string());
    } else if checks::file_smaller_than(&schema, 100)? {
        defects.push("Database schema too short".to_string());
    }

    let arch_report = architect.join("report.json");
    if !arch_report.exists() {
        defects.push("Missing: agents/architect/output/report.json".to_string());
    } else {
        match checks::read_json(&arch_report)? {
            Ok(doc) => {
                let status = doc.get("status").cloned().unwrap_or(serde_json::Value::Null);
                if status != "COMPLETED" {
                    defects.push(format!(
                        "Architect status is '{}', expected 'COMPLETED'",
                        checks::render_value(&status)
                    ));
                }
            }
            Err(_) => defects.push("Invalid JSON in architect report.json".to_string()),
        }
    }

    let exec_plan = planner.join("execution_plan.json");
    if !exec_plan.exists() {
        defects.push("Missing: agents/planner/output/execution_plan.json".to_string());
    } else {
        match checks::read_json(&exec_plan)? {
            Ok(doc) => {
                if doc.get("phases").is_none() {
                    defects.push("Execution plan missing 'phases' field".to_string());
                }
            }
            Err(_) => defects.push("Invalid JSON in execution_plan.json".to_string()),
        }
    }

    let task_list = planner.join("task_list.json");
    if !task_list.exists() {
        defects.push("Missing: agents/planner/output/task_list.json".to_string());
    } else {
        match checks::read_json(&task_list)? {
            Ok(doc) => {
                if !doc.get("tasks").map(checks::is_truthy).unwrap_or(false) {
                    defects.push("Task list has no tasks defined".to_string());
                }
            }
            Err(_) => defects.push("Invalid JSON in task_list.json".to_string()),
        }
    }

    let planner_report = planner.join("report.json");
    if !planner_report.exists() {
        defects.push("Missing: agents/planner/output/report.json".to_string());
    } else {
        match checks::read_json(&planner_report)? {
            Ok(doc) => {
                let status = doc.get("status").cloned().unwrap_or(serde_json::Value::Null);
                if status != "COMPLETED" {
                    defects.push(format!(
                        "Planner status is '{}', expected 'COMPLETED'",
                        checks::render_value(&status)
                    ));
                }
            }
            Err(_) => defects.push("Invalid JSON in planner report.json".to_string()),
        }
    }

    Ok(defects)
}

/// Phase 2: the locked master API specification.
pub(super) fn specification(root: &Path, parser: &dyn DocParser) -> Result<Vec<String>> {
    let mut defects = Vec::new();

    let master_spec = root.join("specs").join("api.openapi.yaml");
    if !master_spec.exists() {
        defects
            .push("Missing: specs/api.openapi.yaml (master specification not locked)".to_string());
    } else if parser.available() {
        // Read failures here are faults, not defects; only the parse is
        // guarded.
        let raw = fs::read_to_string(&master_spec)
            .with_context(|| format!("Failed to read {}", master_spec.display()))?;
        match parser.parse_yaml(&raw) {
            Ok(doc) => {
                if doc.get("openapi").is_none() {
                    defects.push("Master spec missing 'openapi' version field".to_string());
                }
                if !doc.get("paths").map(checks::is_truthy).unwrap_or(false) {
                    defects.push("Master spec has no paths defined".to_string());
                }
            }
            Err(e) => defects.push(format!("Invalid YAML in master spec: {}", e)),
        }
    } else if checks::file_smaller_than(&master_spec, 500)? {
        defects.push("Master spec file too small (< 500 bytes)".to_string());
    }

    Ok(defects)
}

/// Phase 3: backend and frontend source plus their test suites.
pub(super) fn implementation(root: &Path, _parser: &dyn DocParser) -> Result<Vec<String>> {
    let mut defects = Vec::new();

    let backend_src = root.join("backend").join("src");
    if backend_src.exists() {
        if !checks::glob_matches(&backend_src, "routes/*.ts")?
            && !checks::glob_matches(&backend_src, "routes/*.js")?
        {
            defects.push("No backend route files found in backend/src/routes/".to_string());
        }
    } else {
        defects.push("Backend src directory not found".to_string());
    }

    let frontend_src = root.join("frontend").join("src");
    if frontend_src.exists() {
        if !checks::glob_matches(&frontend_src, "components/*")? {
            defects.push("No frontend components found in frontend/src/components/".to_string());
        }
    } else {
        defects.push("Frontend src directory not found".to_string());
    }

    let backend_tests = root.join("backend").join("tests");
    if !backend_tests.exists() || !checks::glob_matches(&backend_tests, "**/*.test.*")? {
        defects.push("No backend tests found".to_string());
    }

    let frontend_tests = root.join("frontend").join("tests");
    if !frontend_tests.exists() || !checks::glob_matches(&frontend_tests, "**/*.test.*")? {
        defects.push("No frontend tests found".to_string());
    }

    Ok(defects)
}

/// Phase 4: container and CI wiring.
pub(super) fn infrastructure(root: &Path, _parser: &dyn DocParser) -> Result<Vec<String>> {
    let mut defects = Vec::new();

    if !root.join("backend").join("Dockerfile").exists() {
        defects.push("Missing: backend/Dockerfile".to_string());
    }
    if !root.join("frontend").join("Dockerfile").exists() {
        defects.push("Missing: frontend/Dockerfile".to_string());
    }

    // The compose file may live at the root or under config/docker/.
    let compose = root.join("docker-compose.yml");
    let compose_alt = root.join("config").join("docker").join("docker-compose.yml");
    if !compose.exists() && !compose_alt.exists() {
        defects.push("Missing: docker-compose.yml".to_string());
    }

    if !root.join(".github").join("workflows").join("ci.yml").exists() {
        defects.push("Missing: .github/workflows/ci.yml".to_string());
    }

    Ok(defects)
}

/// Phase 5: the operator documentation set.
pub(super) fn documentation(root: &Path, _parser: &dyn DocParser) -> Result<Vec<String>> {
    let mut defects = Vec::new();
    let docs = root.join("docs");

    for name in ["API.md", "ARCHITECTURE.md", "SETUP.md", "DEPLOYMENT.md"] {
        let path = docs.join(name);
        if !path.exists() {
            defects.push(format!("Missing: docs/{}", name));
        } else if checks::file_smaller_than(&path, 500)? {
            defects.push(format!("docs/{} is too short (< 500 bytes)", name));
        }
    }

    Ok(defects)
}

/// Phase 6: re-runs every earlier gate and reports one summary line per
/// phase that still has open defects.
pub(super) fn final_validation(root: &Path, parser: &dyn DocParser) -> Result<Vec<String>> {
    type Validator = fn(&Path, &dyn DocParser) -> Result<Vec<String>>;

    let earlier: [(i64, Validator); 5] = [
        (1, analysis_planning),
        (2, specification),
        (3, implementation),
        (4, infrastructure),
        (5, documentation),
    ];

    let mut defects = Vec::new();
    for (number, validate) in earlier {
        let phase_defects = validate(root, parser)?;
        if !phase_defects.is_empty() {
            defects.push(format!(
                "Phase {} validation failed: {} issues",
                number,
                phase_defects.len()
            ));
        }
    }

    Ok(defects)
}
