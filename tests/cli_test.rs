//! CLI integration tests for oas-client binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("oas-client"))
}

// Helper to create a temp document file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const PETSTORE: &str = r##"{
    "openapi": "3.0.3",
    "info": {"title": "pets", "version": "1"},
    "paths": {
        "/pets": {
            "get": {
                "operationId": "listPets",
                "tags": ["pets"],
                "responses": {"200": {"description": "ok"}}
            },
            "post": {
                "operationId": "createPet",
                "requestBody": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/Pet"}}}},
                "responses": {"201": {"description": "created"}}
            }
        },
        "/pets/{petId}": {
            "delete": {
                "parameters": [{"name": "petId", "in": "path", "required": true, "schema": {"type": "integer"}}],
                "responses": {"204": {"description": "gone"}}
            }
        }
    },
    "components": {
        "schemas": {
            "Pet": {
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": {"type": "string", "minLength": 1},
                    "tag": {"type": "string", "nullable": true}
                }
            }
        }
    }
}"##;

mod check_command {
    use super::*;

    #[test]
    fn valid_document() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "openapi.json", PETSTORE);

        cmd()
            .args(["check", doc.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("3 operations"));
    }

    #[test]
    fn yaml_document_with_external_ref() {
        let dir = TempDir::new().unwrap();
        write_temp_file(
            &dir,
            "schemas.yaml",
            "Pet:\n  type: object\n  properties:\n    name:\n      type: string\n",
        );
        let doc = write_temp_file(
            &dir,
            "openapi.yaml",
            r#"openapi: 3.1.0
info: {title: pets, version: "1"}
paths:
  /pets:
    get:
      operationId: listPets
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema:
                $ref: "schemas.yaml#/Pet"
"#,
        );

        cmd()
            .args(["check", doc.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("1 operations"));
    }

    #[test]
    fn unresolved_reference_exits_2() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(
            &dir,
            "openapi.json",
            r##"{"openapi": "3.1.0", "paths": {}, "components": {"schemas": {"A": {"$ref": "#/components/schemas/Missing"}}}}"##,
        );

        cmd()
            .args(["check", doc.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn duplicate_operation_id_exits_2() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(
            &dir,
            "openapi.json",
            r#"{"openapi": "3.0.0", "paths": {
                "/a": {"get": {"operationId": "same", "responses": {"200": {"description": "ok"}}}},
                "/b": {"get": {"operationId": "same", "responses": {"200": {"description": "ok"}}}}
            }}"#,
        );

        cmd()
            .args(["check", doc.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Duplicate operationId same"));
    }

    #[test]
    fn unsupported_version_exits_2() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "swagger.json", r#"{"swagger": "2.0", "paths": {}}"#);

        cmd()
            .args(["check", doc.to_str().unwrap()])
            .assert()
            .code(2);
    }

    #[test]
    fn missing_file_exits_3() {
        cmd()
            .args(["check", "/nonexistent/openapi.json"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("not found"));
    }
}

mod operations_command {
    use super::*;

    #[test]
    fn lists_every_operation() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "openapi.json", PETSTORE);

        cmd()
            .args(["operations", doc.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("listPets GET /pets"))
            .stdout(predicate::str::contains("createPet POST /pets"))
            .stdout(predicate::str::contains("- DELETE /pets/{petId}"));
    }

    #[test]
    fn filters_by_tag() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "openapi.json", PETSTORE);

        cmd()
            .args(["operations", doc.to_str().unwrap(), "--tag", "pets"])
            .assert()
            .success()
            .stdout(predicate::str::contains("listPets"))
            .stdout(predicate::str::contains("createPet").not());
    }
}

mod validate_command {
    use super::*;

    #[test]
    fn valid_payload() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "openapi.json", PETSTORE);
        let payload = write_temp_file(&dir, "pet.json", r#"{"name": "rex", "tag": null}"#);

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--doc",
                doc.to_str().unwrap(),
                "--schema",
                "Pet",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Valid"));
    }

    #[test]
    fn invalid_payload_exits_1() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "openapi.json", PETSTORE);
        let payload = write_temp_file(&dir, "pet.json", r#"{"name": ""}"#);

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--doc",
                doc.to_str().unwrap(),
                "--schema",
                "Pet",
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Validation failed"))
            .stderr(predicate::str::contains("/name"));
    }

    #[test]
    fn invalid_payload_json_output() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "openapi.json", PETSTORE);
        let payload = write_temp_file(&dir, "pet.json", r#"{"tag": "dog"}"#);

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--doc",
                doc.to_str().unwrap(),
                "--schema",
                "Pet",
                "--json",
            ])
            .assert()
            .code(1)
            .stdout(predicate::str::contains(r#""valid":false"#))
            .stdout(predicate::str::contains(r#""keyword":"required""#));
    }

    #[test]
    fn unknown_schema_exits_2() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "openapi.json", PETSTORE);
        let payload = write_temp_file(&dir, "pet.json", r#"{"name": "rex"}"#);

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--doc",
                doc.to_str().unwrap(),
                "--schema",
                "Cat",
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("unknown schema Cat"));
    }

    #[test]
    fn malformed_payload_exits_2() {
        let dir = TempDir::new().unwrap();
        let doc = write_temp_file(&dir, "openapi.json", PETSTORE);
        let payload = write_temp_file(&dir, "pet.json", "{not json");

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--doc",
                doc.to_str().unwrap(),
                "--schema",
                "Pet",
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("loading payload"));
    }
}

#[test]
fn requires_subcommand() {
    cmd().assert().failure();
}
