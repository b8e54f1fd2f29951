//! `foreman templates`: list the built-in task templates.

use foreman_core::task::TemplateLibrary;

pub fn list() {
    let library = TemplateLibrary::builtin();
    println!("{} built-in templates:", library.len());
    for template in library.names().iter().filter_map(|name| library.get(name)) {
        println!(
            "  {:<24} {} ({}), tags: {}",
            template.name,
            template.task_type,
            template.priority,
            if template.tags.is_empty() {
                "-".to_string()
            } else {
                template.tags.join(", ")
            }
        );
    }
}
