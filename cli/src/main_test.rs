mod tests {
    use crate::*;

    fn run_args(argv: &[&str]) -> RunArgs {
        match CliArgs::try_parse_from(argv).expect("should parse").command {
            Commands::Run(args) => args,
            other => panic!("expected run command, got {:?}", other),
        }
    }

    #[test]
    fn test_sanitize_path_allows_simple_relative() {
        let p = sanitize_path("foo/bar.bsk").expect("relative path should be allowed");
        assert_eq!(p, PathBuf::from("foo/bar.bsk"));
    }

    #[test]
    fn test_sanitize_path_rejects_parent_dir() {
        let err = sanitize_path("foo/../bar.bsk").unwrap_err();
        assert!(err.to_string().contains("Parent directory components"));
    }

    #[test]
    fn test_cli_args_rejects_parent_dir_in_run() {
        let err = CliArgs::try_parse_from(["brisk", "run", "../a.bsk"]).unwrap_err();
        assert!(err.to_string().contains("Parent directory components"));
    }

    #[test]
    fn test_cli_args_parses_run_switches() {
        let args = run_args(&["brisk", "run", "a.bsk", "--trace", "--debug-code", "--stack-size", "4096"]);
        assert_eq!(args.file, PathBuf::from("a.bsk"));
        assert!(args.trace);
        assert!(args.debug_code);
        assert_eq!(args.stack_size, Some(4096));
        assert!(args.trace_json.is_none());
    }

    #[test]
    fn test_cli_args_parses_disasm() {
        let args = CliArgs::try_parse_from(["brisk", "disasm", "a.bsk"]).expect("should parse");
        assert!(matches!(args.command, Commands::Disasm { ref file } if file == Path::new("a.bsk")));
    }

    #[test]
    fn test_resolve_flags_applies_switches_over_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = dir.path().join("brisk.toml");
        fs::write(&config, "debug_code = false\nstack_size = 100000\nstack_reserve = 512\n").expect("write config");

        let config_arg = config.to_str().expect("utf-8 path");
        let flags = resolve_flags(&run_args(&["brisk", "run", "a.bsk", "--config", config_arg])).expect("flags");
        assert_eq!(flags.stack_size, 100000);
        assert_eq!(flags.stack_reserve, 512);

        let flags = resolve_flags(&run_args(&[
            "brisk",
            "run",
            "a.bsk",
            "--config",
            config_arg,
            "--debug-code",
            "--trace-json",
            "out.json",
            "--stack-size",
            "1024",
        ]))
        .expect("flags");
        assert!(flags.debug_code);
        assert!(flags.trace_ignition);
        assert_eq!(flags.stack_size, 1024);
        assert_eq!(flags.stack_reserve, 256);
    }

    #[test]
    fn test_resolve_flags_reports_bad_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = dir.path().join("brisk.toml");
        fs::write(&config, "stack_size = 8\nstack_reserve = 8\n").expect("write config");
        let err = resolve_flags(&run_args(&["brisk", "run", "a.bsk", "--config", config.to_str().unwrap()]))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("stack_reserve"));
    }

    #[test]
    fn test_max_call_depth_switch_sizes_worker_stack() {
        let flags = resolve_flags(&run_args(&["brisk", "run", "a.bsk", "--max-call-depth", "16"])).expect("flags");
        assert_eq!(flags.max_call_depth, 16);
        assert_eq!(worker_stack_size(&flags), 16 * NATIVE_STACK_PER_CALL + NATIVE_STACK_BASE);

        let err = resolve_flags(&run_args(&["brisk", "run", "a.bsk", "--max-call-depth", "0"])).unwrap_err();
        assert!(format!("{:#}", err).contains("max_call_depth"));
    }
}
