mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use common::{TEST_MAX_UPLOAD, question_csv, setup};
use serde_json::{Value, json};
use tower::ServiceExt;

const BOUNDARY: &str = "classdrive-test-boundary";

/// A part of a multipart body: (field name, optional file name, bytes).
type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, bytes) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: text/plain\r\n\r\n",
                    name, file_name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, req).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_endpoints() {
    let env = setup().await;
    let app = classdrive::app(env.state.clone());

    let (status, body) = send_json(&app, get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send_json(&app, get("/readyz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["sqlite"]["ok"], true);
    assert_eq!(body["checks"]["blobs"]["ok"], true);
}

#[tokio::test]
async fn folder_upload_download_roundtrip() {
    let env = setup().await;
    let app = classdrive::app(env.state.clone());

    let (status, body) = send_json(
        &app,
        json_request(Method::POST, "/api/folders", json!({"name": "Tugas"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["path"], "/Tugas/");

    let oversized = vec![b'x'; TEST_MAX_UPLOAD + 1];
    let (status, body) = send_json(
        &app,
        multipart_request(
            "/api/files?parent_path=/Tugas/",
            &[
                ("file", Some("bab 1.txt"), &b"isi bab satu"[..]),
                ("file", Some("big.bin"), oversized.as_slice()),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uploaded"][0]["path"], "/Tugas/bab_1.txt");
    assert_eq!(
        body["uploaded"][0]["url"],
        "http://localhost:3000/blobs/Tugas/bab_1.txt"
    );
    assert_eq!(body["rejected"][0]["name"], "big.bin");
    assert_eq!(body["rejected"][0]["kind"], "size_limit_exceeded");

    let (status, body) = send_json(&app, get("/api/files?path=/Tugas")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["path"], "/Tugas/");
    assert_eq!(body["breadcrumbs"][0]["name"], "Tugas");
    assert_eq!(body["entries"].as_array().unwrap().len(), 1);

    let resp = app
        .clone()
        .oneshot(get("/blobs/Tugas/bab_1.txt"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/plain");
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"isi bab satu");

    let (status, body) = send_json(&app, get("/blobs/Tugas/missing.txt")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn oversized_part_is_rejected_without_failing_the_request() {
    let env = setup().await;
    let app = classdrive::app(env.state.clone());

    // larger than the upload ceiling and than every other route's body limit
    let big = vec![b'z'; 6 * 1024 * 1024];
    let (status, body) = send_json(
        &app,
        multipart_request(
            "/api/files",
            &[
                ("file", Some("small.txt"), &b"ok"[..]),
                ("file", Some("big.bin"), big.as_slice()),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["uploaded"].as_array().unwrap().len(), 1);
    assert_eq!(body["uploaded"][0]["path"], "/small.txt");
    assert_eq!(body["rejected"][0]["name"], "big.bin");
    assert_eq!(body["rejected"][0]["kind"], "size_limit_exceeded");
    assert!(
        body["rejected"][0]["error"]
            .as_str()
            .unwrap()
            .contains(&big.len().to_string())
    );
    assert!(env.state.files.get_entry("/big.bin").await.is_err());
}

#[tokio::test]
async fn public_url_of_spaced_folder_is_escaped_and_downloadable() {
    let env = setup().await;
    let app = classdrive::app(env.state.clone());

    env.state.files.create_folder("/", "Tugas Akhir").await.unwrap();
    let (status, body) = send_json(
        &app,
        multipart_request(
            "/api/files?parent_path=/Tugas%20Akhir/",
            &[("file", Some("a.txt"), &b"akhir"[..])],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["uploaded"][0]["path"], "/Tugas Akhir/a.txt");
    assert_eq!(
        body["uploaded"][0]["url"],
        "http://localhost:3000/blobs/Tugas%20Akhir/a.txt"
    );

    let (status, bytes) = send(&app, get("/blobs/Tugas%20Akhir/a.txt")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"akhir");
}

#[tokio::test]
async fn control_characters_in_folder_names_are_refused() {
    let env = setup().await;
    let app = classdrive::app(env.state.clone());

    let (status, body) = send_json(
        &app,
        json_request(Method::POST, "/api/folders", json!({"name": "a\tb"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_input");
    assert!(body["error"].as_str().unwrap().contains("control characters"));
}

#[tokio::test]
async fn rename_and_delete_over_http() {
    let env = setup().await;
    let app = classdrive::app(env.state.clone());

    env.state.files.create_folder("/", "Lama").await.unwrap();
    env.state
        .files
        .upload_file("/Lama/", "a.txt", b"a", None, TEST_MAX_UPLOAD)
        .await
        .unwrap();

    let (status, body) = send_json(
        &app,
        json_request(
            Method::POST,
            "/api/entries/rename",
            json!({"path": "/Lama/", "new_name": "Baru"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["path"], "/Baru/");

    let (status, body) = send_json(
        &app,
        json_request(
            Method::POST,
            "/api/folders",
            json!({"parent_path": "/", "name": "Baru"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");
    assert_eq!(body["status"], 409);

    let req = Request::builder()
        .method(Method::DELETE)
        .uri("/api/entries?path=/Baru/")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries_removed"], 2);

    let (_, body) = send_json(&app, get("/api/files/stats")).await;
    assert_eq!(body["file_count"], 0);
    assert_eq!(body["folder_count"], 0);
}

#[tokio::test]
async fn import_preview_and_commit_over_http() {
    let env = setup().await;
    let app = classdrive::app(env.state.clone());

    let (status, _) = send_json(
        &app,
        json_request(Method::POST, "/api/classes", json!({"name": "X IPS"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let csv = question_csv(&["Q1,a,b,,,A,5", "Q2,a,b,,,B,5"]);
    let (status, body) = send_json(
        &app,
        multipart_request("/api/imports/preview", &[("file", Some("soal.csv"), csv.as_slice())]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["format"], "csv");
    assert_eq!(body["questions"].as_array().unwrap().len(), 2);

    let exam = json!({"title": "UTS", "classes": ["X IPS"]}).to_string();
    let mapping = json!({
        "question": "Pertanyaan",
        "option_a": "Opsi A",
        "option_b": "Opsi B",
        "correct_answer": "Jawaban Benar",
        "points": {"kind": "fixed", "value": 3}
    })
    .to_string();
    let (status, body) = send_json(
        &app,
        multipart_request(
            "/api/imports",
            &[
                ("file", Some("soal.csv"), csv.as_slice()),
                ("mapping", None, mapping.as_bytes()),
                ("exam", None, exam.as_bytes()),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["imported"], 2);
    let exam_id = body["exam"]["id"].as_str().unwrap().to_string();

    let (status, body) =
        send_json(&app, get(&format!("/api/exams/{}/questions", exam_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["points"], 3);
    assert_eq!(body[1]["correct_index"], 1);

    let (status, body) = send_json(
        &app,
        json_request(
            Method::PATCH,
            &format!("/api/exams/{}", exam_id),
            json!({"published": false}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["published"], false);
}

#[tokio::test]
async fn exam_authoring_over_http() {
    let env = setup().await;
    let app = classdrive::app(env.state.clone());
    env.state.catalog.create_class("XI IPA").await.unwrap();

    let (status, exam) = send_json(
        &app,
        json_request(
            Method::POST,
            "/api/exams",
            json!({
                "title": "Kuis Kimia",
                "duration_minutes": 30,
                "exam_date": "2025-05-02",
                "classes": ["XI IPA"]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{exam}");
    assert_eq!(exam["published"], false);
    assert_eq!(exam["exam_date"], "2025-05-02");
    let exam_id = exam["id"].as_str().unwrap().to_string();
    let questions_uri = format!("/api/exams/{}/questions", exam_id);

    let mut ids = Vec::new();
    for text in ["H2O adalah?", "NaCl adalah?"] {
        let (status, question) = send_json(
            &app,
            json_request(
                Method::POST,
                &questions_uri,
                json!({
                    "question_text": text,
                    "options": ["Air", "Garam"],
                    "correct_index": 0
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{question}");
        assert_eq!(question["points"], 5);
        ids.push(question["id"].as_str().unwrap().to_string());
    }

    let (status, question) = send_json(
        &app,
        json_request(
            Method::PUT,
            &format!("/api/questions/{}", ids[1]),
            json!({
                "question_text": "NaCl adalah?",
                "options": ["Air", "Garam"],
                "correct_index": 1,
                "points": 8
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(question["correct_index"], 1);

    let req = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/api/questions/{}", ids[0]))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, questions) = send_json(&app, get(&questions_uri)).await;
    assert_eq!(questions.as_array().unwrap().len(), 1);
    assert_eq!(questions[0]["position"], 1);
    assert_eq!(questions[0]["points"], 8);

    let (status, exam) = send_json(
        &app,
        json_request(
            Method::PATCH,
            &format!("/api/exams/{}", exam_id),
            json!({"duration_minutes": 40, "published": true}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(exam["duration_minutes"], 40);
    assert_eq!(exam["question_count"], 1);
    assert_eq!(exam["published"], true);

    let (status, body) = send_json(
        &app,
        json_request(
            Method::POST,
            &questions_uri,
            json!({"question_text": "?", "options": ["x"], "correct_index": 0}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_input");

    let (status, _) = send_json(
        &app,
        get(&format!("/api/exams/{}", uuid::Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn import_errors_map_to_statuses() {
    let env = setup().await;
    let app = classdrive::app(env.state.clone());

    let (status, body) = send_json(
        &app,
        multipart_request("/api/imports/preview", &[("file", Some("soal.txt"), &b"x"[..])]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_input");

    let csv = question_csv(&["Q1,a,b,,,A,5"]);
    let exam = json!({"title": "UTS", "classes": []}).to_string();
    let (status, _) = send_json(
        &app,
        multipart_request(
            "/api/imports",
            &[("file", Some("soal.csv"), csv.as_slice()), ("exam", None, exam.as_bytes())],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn template_download_is_csv() {
    let env = setup().await;
    let app = classdrive::app(env.state.clone());

    let resp = app
        .clone()
        .oneshot(get("/api/imports/template.csv"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("template_soal_ujian.csv")
    );
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("Pertanyaan,Opsi A,Opsi B,Opsi C,Opsi D,Jawaban Benar,Poin"));
}
