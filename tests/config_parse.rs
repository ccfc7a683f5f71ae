use burst_doe::config::{Config, Grade, InconsistentPolicy, SizeClass, Variant, WorkspaceMode};

#[test]
fn parse_example_config() {
    let raw = include_str!("../burst-doe.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.campaign.variant, Variant::CrackCorrosion);
    assert_eq!(cfg.campaign.material_grade, Grade::X65);
    assert_eq!(cfg.workspace.mode, WorkspaceMode::Shared);
    assert_eq!(cfg.cleanup.extensions.len(), 8);
    assert!(!cfg.paths.out_dir.is_empty());
    cfg.validate().expect("example config is valid");
}

#[test]
fn sparse_config_falls_back_to_defaults() {
    let raw = r#"
        [campaign]
        variant = "twin_crack"
        thickness_class = "small"
        diameter_class = "large"
        material_grade = "x100"
        job_prefix = ""
        print_summary = false

        [axes.ligament_1]
        enabled = true
        values = [0.002, 0.003]
    "#;
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.campaign.thickness_class, SizeClass::Small);
    assert_eq!(cfg.geometry.on_inconsistent, InconsistentPolicy::Skip);
    assert!(!cfg.geometry.enforce_max_length);
    assert_eq!(cfg.job_prefix(), "Burst_full_cc_sTbD_");
    cfg.validate().unwrap();
}

#[test]
fn unknown_grade_is_rejected_at_parse() {
    let raw = r#"
        [campaign]
        variant = "crack_corrosion"
        thickness_class = "small"
        diameter_class = "small"
        material_grade = "x80"
        job_prefix = ""
        print_summary = true
    "#;
    assert!(toml::from_str::<Config>(raw).is_err());
}
