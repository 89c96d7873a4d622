use colored::Colorize;
use lakebase_control::ProvisionResult;
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_field(label: &str, value: &str) {
    println!("{}: {}", label.cyan(), value);
}

pub fn print_step(msg: &str) {
    println!("\n{}", msg.bold());
}

/// Converged resources as a two-column table.
pub fn summary_table(result: &ProvisionResult) -> String {
    let host = if result.host.is_empty() {
        "(not ready)"
    } else {
        result.host.as_str()
    };
    let mut builder = Builder::default();
    builder.push_record(["Resource", "Value"]);
    builder.push_record(["Project", result.project_name.as_str()]);
    builder.push_record(["Branch", result.branch_name.as_str()]);
    builder.push_record(["Endpoint", result.endpoint_name.as_str()]);
    builder.push_record(["Host", host]);
    builder.push_record(["Database", result.database.as_str()]);
    builder.build().with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_every_resource() {
        let table = summary_table(&ProvisionResult {
            project_name: "projects/todo-app".into(),
            branch_name: "projects/todo-app/branches/dev-alice".into(),
            endpoint_name: "projects/todo-app/branches/dev-alice/endpoints/default".into(),
            host: String::new(),
            database: "todoapp".into(),
        });
        assert!(table.contains("projects/todo-app/branches/dev-alice/endpoints/default"));
        assert!(table.contains("(not ready)"));
        assert!(table.contains("todoapp"));
    }
}
