use axum::{response::Redirect, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(landing))
        .route("/openapi", get(openapi))
}

async fn landing() -> Redirect {
    Redirect::to("/openapi")
}

async fn openapi() -> Json<Value> {
    Json(openapi_document())
}

pub fn openapi_document() -> Value {
    json!({
        "openapi": "3.0.3",
        "info": { "title": "Minha Querida API de Viagens", "version": "1.0.0" },
        "tags": [{ "name": "Viagem", "description": "Cadastro e listagem de viagens" }],
        "paths": {
            "/viagem": {
                "post": create_operation(),
                "get": get_operation(),
                "put": update_operation(),
                "delete": delete_operation()
            },
            "/viagens": { "get": list_operation() }
        },
        "components": { "schemas": schemas() }
    })
}

fn error() -> Value {
    json!({ "$ref": "#/components/schemas/Error" })
}

fn id_param() -> Value {
    json!([{ "name": "id", "in": "query", "required": true, "schema": { "type": "integer" } }])
}

fn photos_property() -> Value {
    json!({ "type": "array", "items": { "type": "string", "format": "binary" } })
}

fn create_operation() -> Value {
    let form = json!({
        "type": "object",
        "required": ["destino", "detalhes", "rating"],
        "properties": {
            "destino": { "type": "string" },
            "detalhes": { "type": "string" },
            "rating": { "type": "number" },
            "fotos": photos_property()
        }
    });
    json!({
        "tags": ["Viagem"],
        "summary": "Adiciona uma nova viagem à base de dados",
        "requestBody": { "content": { "multipart/form-data": { "schema": form } } },
        "responses": {
            "200": json_response(json!({ "$ref": "#/components/schemas/ViagemView" })),
            "400": json_response(error()),
            "409": json_response(error()),
            "422": json_response(error())
        }
    })
}

fn get_operation() -> Value {
    json!({
        "tags": ["Viagem"],
        "summary": "Obtém uma viagem a partir do id informado",
        "parameters": id_param(),
        "responses": {
            "200": json_response(json!({ "$ref": "#/components/schemas/ViagemView" })),
            "404": json_response(error()),
            "422": json_response(error())
        }
    })
}

fn update_operation() -> Value {
    let form = json!({
        "type": "object",
        "required": ["id"],
        "properties": {
            "id": { "type": "integer" },
            "destino": { "type": "string" },
            "detalhes": { "type": "string" },
            "rating": { "type": "number" },
            "fotos": photos_property()
        }
    });
    json!({
        "tags": ["Viagem"],
        "summary": "Atualiza uma viagem a partir do id informado",
        "requestBody": { "content": { "multipart/form-data": { "schema": form } } },
        "responses": {
            "200": json_response(json!({ "$ref": "#/components/schemas/Message" })),
            "400": json_response(error()),
            "404": json_response(error()),
            "409": json_response(error())
        }
    })
}

fn delete_operation() -> Value {
    json!({
        "tags": ["Viagem"],
        "summary": "Deleta uma viagem a partir do id informado",
        "parameters": id_param(),
        "responses": {
            "200": json_response(json!({ "type": "object", "properties": { "id": { "type": "integer" } } })),
            "400": json_response(error()),
            "422": json_response(error())
        }
    })
}

fn list_operation() -> Value {
    json!({
        "tags": ["Viagem"],
        "summary": "Obtém a lista de todas as viagens cadastradas na base",
        "responses": {
            "200": json_response(json!({ "$ref": "#/components/schemas/ViagemLista" })),
            "404": json_response(error())
        }
    })
}

fn schemas() -> Value {
    let message = json!({ "type": "object", "properties": { "message": { "type": "string" } } });
    json!({
        "ViagemView": {
            "type": "object",
            "properties": {
                "id": { "type": "integer" },
                "destino": { "type": "string" },
                "detalhes": { "type": "string" },
                "rating": { "type": "number" },
                "fotos": { "type": "string", "description": "URLs separadas por vírgula" }
            }
        },
        "ViagemLista": {
            "type": "object",
            "properties": {
                "viagem": { "type": "array", "items": { "$ref": "#/components/schemas/ViagemView" } }
            }
        },
        "Message": message.clone(),
        "Error": message
    })
}

fn json_response(schema: Value) -> Value {
    json!({ "content": { "application/json": { "schema": schema } } })
}
