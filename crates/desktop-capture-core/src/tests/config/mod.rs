mod capture_config;
