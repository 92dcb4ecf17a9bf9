//! End-to-end planning from a free-text description.

use storm_planner::{
    classify_project, count_files, development_plan, extract_project_name, flatten_file_structure,
    generate_tasks, plan_structure, synthesize_file_content, ContentSource, Framework, Language,
    ProjectType, TechStack, TemplateContent,
};

#[test]
fn test_flask_description_to_plan() {
    let description = "build a flask app called demo";
    let (project_type, stack) = classify_project(description);

    assert_eq!(extract_project_name(description), "demo");
    assert_eq!(project_type, ProjectType::Mobile);
    assert_eq!(stack, TechStack::new(Language::Python, Framework::Flask));

    let tree = plan_structure(project_type, &stack);
    let files = flatten_file_structure(&tree);
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();

    for expected in ["app.py", "requirements.txt", "templates/index.html"] {
        assert!(paths.contains(&expected), "missing {}", expected);
    }
    assert_eq!(count_files(&tree), files.len());

    let tasks = generate_tasks(project_type, &stack);
    let plan = development_plan(project_type, &stack, &tree, &tasks);
    assert!(plan.contains("**Total files to generate:** 13"));
}

#[test]
fn test_every_planned_file_has_content() {
    for description in ["a react portfolio", "a flask blog with sqlite"] {
        let (project_type, stack) = classify_project(description);
        let tree = plan_structure(project_type, &stack);

        for file in flatten_file_structure(&tree) {
            let content = synthesize_file_content(&file.path, project_type, &stack);
            assert!(!content.is_empty(), "{} has no content", file.path);
        }
    }
}

#[tokio::test]
async fn test_template_source_matches_table() {
    let (project_type, stack) = classify_project("a react portfolio");
    let source: Box<dyn ContentSource> = Box::new(TemplateContent);

    let from_trait = source.file_content("src/App.js", project_type, &stack).await;
    let direct = synthesize_file_content("src/App.js", project_type, &stack);
    assert_eq!(from_trait, direct);
}
