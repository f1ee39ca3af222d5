use std::path::PathBuf;
use std::sync::Arc;

use digit_pad::{
    ConfigurationError, DigitClassifier, DigitConfidence, DigitPipeline, LinearClassifier, PadConfig,
    PadError, classify, to_model_input,
};

const DEFAULT_BIND: &str = "127.0.0.1:3001";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub model_path: Option<PathBuf>,
    pub pad: PadConfig,
}

impl ServerConfig {
    /// Reads `DIGIT_PAD_BIND`, `DIGIT_PAD_MODEL` and the `DIGIT_PAD_*` pad overrides.
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = std::env::var("DIGIT_PAD_BIND")
            .ok()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let model_path = std::env::var("DIGIT_PAD_MODEL")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let pad = PadConfig::desktop().from_env()?;
        Ok(Self {
            bind_addr,
            model_path,
            pad,
        })
    }

    /// The classifier behind the predict endpoint. Without a model path every
    /// prediction reports the model as unavailable.
    pub fn classifier(&self) -> Arc<dyn DigitClassifier> {
        match &self.model_path {
            Some(path) => Arc::new(LinearClassifier::from_path(path)),
            None => Arc::new(LinearClassifier::unconfigured()),
        }
    }
}

/// Body of `POST /api/predict`: the raw `ImageData` of the pad canvas.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "web", derive(serde::Serialize, serde::Deserialize))]
pub struct PredictBody {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "web", derive(serde::Serialize))]
pub struct PredictReply {
    pub sequence: u64,
    pub label: String,
    pub reduced: Vec<Vec<f32>>,
    pub prediction: Vec<DigitConfidence>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "web", derive(serde::Serialize))]
pub struct ErrorReply {
    pub sequence: u64,
    pub error: String,
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DigitPipeline>,
    pub classifier: Arc<dyn DigitClassifier>,
}

impl AppState {
    pub fn new(
        pad: PadConfig,
        classifier: Arc<dyn DigitClassifier>,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            pipeline: Arc::new(DigitPipeline::new(pad)?),
            classifier,
        })
    }
}

/// Reduces the posted canvas and runs the classifier on it.
pub async fn handle_predict(state: &AppState, body: PredictBody) -> Result<PredictReply, PadError> {
    let reduction = state
        .pipeline
        .reduce_frame(body.width, body.height, &body.pixels)?;
    let batch = to_model_input(&reduction.reduced).batch();
    let prediction = classify(state.classifier.as_ref(), &batch).await?;
    Ok(PredictReply {
        sequence: body.sequence,
        label: prediction.label(),
        reduced: reduction.reduced.to_rows(),
        prediction: prediction.ranked().to_vec(),
    })
}

/// HTTP status for a failed prediction.
pub fn error_status(err: &PadError) -> u16 {
    match err {
        PadError::Configuration(_) => 422,
        PadError::Inference(_) => 503,
        PadError::Image(_) | PadError::Io(_) => 500,
    }
}

/// Routes of the pad front: page, client script, health, config and predict.
#[cfg(feature = "web")]
pub fn router(state: AppState) -> axum::Router {
    use axum::extract::DefaultBodyLimit;
    use axum::http::{HeaderValue, StatusCode, header};
    use axum::response::{Html, IntoResponse};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use leptos::*;

    // A 672x672 canvas posted as a JSON array runs to several megabytes.
    const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

    #[component]
    fn App(canvas_side: usize) -> impl IntoView {
        let side = canvas_side.to_string();
        view! {
            <main>
                <h2>Digit Pad</h2>
                <canvas id="pad" width=side.clone() height=side style="border:1px solid #444; touch-action:none"></canvas>
                <div style="margin: 8px 0; display:flex; gap:12px; align-items:center;">
                    <button id="predict-btn" style="padding:6px 12px;">Predict</button>
                    <button id="clear-btn" style="padding:6px 12px;">Clear</button>
                    <span id="status" style="font-family:monospace; font-size:12px; color:#777">idle</span>
                </div>
                <h3 id="digit-confidence-label" style="display:none"></h3>
                <ol id="digit-confidences" style="font-family:monospace"></ol>
                <script src="/client.js"></script>
            </main>
        }
    }

    // Captures strokes, posts the canvas pixels and renders the newest reply only.
    const CLIENT_JS: &str = r##"(function(){
        const canvas = document.getElementById('pad');
        const ctx = canvas.getContext('2d');
        const label = document.getElementById('digit-confidence-label');
        const list = document.getElementById('digit-confidences');
        const status = (t)=>{ const el=document.getElementById('status'); if(el) el.textContent=t; };
        let config = { scale: 24, grid_side: 28, line_width: 2, allows_multiple_draws: false, can_visualize_as_28x28: false };
        let drawing = false, strokes = 0, sequence = 0, latest = -1;
        const pen = ()=>{ ctx.lineWidth=config.line_width; ctx.strokeStyle='#fff'; ctx.lineCap='round'; ctx.lineJoin='round'; };
        const reset = ()=>{
            ctx.fillStyle='#000'; ctx.fillRect(0,0,canvas.width,canvas.height); pen();
            strokes=0; latest=-1; label.style.display='none'; list.innerHTML=''; status('idle');
        };
        const point = (ev)=>{
            const r = canvas.getBoundingClientRect();
            const p = ev.touches ? ev.touches[0] : ev;
            return [(p.clientX-r.left)*canvas.width/r.width, (p.clientY-r.top)*canvas.height/r.height];
        };
        const render = (reply)=>{
            label.style.display='block';
            label.textContent = reply.label;
            list.innerHTML = reply.prediction.map(d=>`<li>${d.digit}: ${d.confidence}%</li>`).join('');
            if(config.can_visualize_as_28x28){
                const s = config.scale;
                reply.reduced.forEach((row,i)=>row.forEach((v,j)=>{
                    const g = Math.round(v); ctx.fillStyle=`rgb(${g},${g},${g})`; ctx.fillRect(j*s,i*s,s,s);
                }));
            }
        };
        const predict = async ()=>{
            const data = ctx.getImageData(0,0,canvas.width,canvas.height);
            const mine = sequence++; latest = mine; status('loading');
            try {
                const resp = await fetch('/api/predict', { method:'POST', headers:{'content-type':'application/json'},
                    body: JSON.stringify({ sequence: mine, width: data.width, height: data.height, pixels: Array.from(data.data) }) });
                const reply = await resp.json();
                if(reply.sequence !== latest) return;
                if(!resp.ok){ status('error: '+reply.error); return; }
                status('ready'); render(reply);
            } catch(e) { if(mine === latest) status('error: '+e); }
        };
        const down = (ev)=>{
            if(!config.allows_multiple_draws && strokes>0) return;
            ev.preventDefault(); drawing=true;
            const [x,y]=point(ev); ctx.beginPath(); ctx.moveTo(x,y);
        };
        const move = (ev)=>{ if(!drawing) return; ev.preventDefault(); const [x,y]=point(ev); ctx.lineTo(x,y); ctx.stroke(); };
        const up = ()=>{ if(!drawing) return; drawing=false; strokes+=1; predict(); };
        canvas.addEventListener('mousedown', down); canvas.addEventListener('mousemove', move);
        window.addEventListener('mouseup', up);
        canvas.addEventListener('touchstart', down); canvas.addEventListener('touchmove', move);
        canvas.addEventListener('touchend', up);
        document.getElementById('predict-btn').onclick = ()=> predict();
        document.getElementById('clear-btn').onclick = ()=> reset();
        fetch('/api/config').then(r=>r.json()).then(c=>{
            config = c; canvas.width = canvas.height = c.scale*c.grid_side; reset();
        });
        reset();
    })();"##;

    let pad_config = state.pipeline.config().clone();
    let canvas_side = pad_config.canvas_side();
    let page = leptos::ssr::render_to_string(move || view! { <App canvas_side=canvas_side/> }).to_string();

    Router::new()
        .route("/", get(move || async move { Html(page) }))
        .route("/healthz", get(|| async { "ok" }))
        .route(
            "/client.js",
            get(|| async {
                let mut resp = axum::response::Response::new(axum::body::Body::from(CLIENT_JS));
                resp.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/javascript"),
                );
                resp
            }),
        )
        .route("/api/config", get(move || async move { Json(pad_config) }))
        .route(
            "/api/predict",
            post(move |Json(body): Json<PredictBody>| {
                let state = state.clone();
                async move {
                    let sequence = body.sequence;
                    match handle_predict(&state, body).await {
                        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
                        Err(err) => {
                            let status = StatusCode::from_u16(error_status(&err))
                                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                            tracing::warn!(sequence, error = %err, "prediction request failed");
                            let reply = ErrorReply {
                                sequence,
                                error: err.to_string(),
                            };
                            (status, Json(reply)).into_response()
                        }
                    }
                }
            }),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

#[cfg(feature = "web")]
pub async fn start_server(cfg: ServerConfig) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let app = router(AppState::new(cfg.pad.clone(), cfg.classifier())?);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!(
        bind = %cfg.bind_addr,
        model = ?cfg.model_path,
        scale = cfg.pad.scale,
        "digit pad listening"
    );
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "server stopped");
        }
    });

    Ok(server)
}

#[cfg(not(feature = "web"))]
pub async fn start_server(_cfg: ServerConfig) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    Err(anyhow::anyhow!("web feature not enabled for digit_pad_visualizer"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use digit_pad::{InferenceError, LinearWeights};

    fn state(classifier: Arc<dyn DigitClassifier>) -> AppState {
        let pad = PadConfig {
            scale: 2,
            grid_side: 2,
            ..PadConfig::desktop()
        };
        AppState::new(pad, classifier).unwrap()
    }

    fn bright_model() -> Arc<dyn DigitClassifier> {
        let weights = LinearWeights {
            input_side: 2,
            weights: vec![vec![-1.0; 4], vec![1.0; 4]],
            bias: vec![0.0, 0.0],
        };
        Arc::new(LinearClassifier::from_weights(weights).unwrap())
    }

    fn body(side: u32, value: u8) -> PredictBody {
        PredictBody {
            sequence: 9,
            width: side,
            height: side,
            pixels: [value, value, value, 255].repeat((side * side) as usize),
        }
    }

    #[tokio::test]
    async fn predict_echoes_sequence_and_grid() {
        let reply = handle_predict(&state(bright_model()), body(4, 255)).await.unwrap();
        assert_eq!(reply.sequence, 9);
        assert_eq!(reply.label, "Digit: 1");
        assert_eq!(reply.reduced, vec![vec![255.0, 255.0], vec![255.0, 255.0]]);
        assert_eq!(reply.prediction.len(), 2);
    }

    #[tokio::test]
    async fn non_square_canvas_is_unprocessable() {
        let mut request = body(4, 0);
        request.height = 2;
        let err = handle_predict(&state(bright_model()), request).await.unwrap_err();
        assert_eq!(error_status(&err), 422);
    }

    #[tokio::test]
    async fn oversized_dimensions_are_unprocessable() {
        let request = PredictBody {
            sequence: 3,
            width: 4_294_967_280,
            height: 4_294_967_280,
            pixels: vec![0; 16],
        };
        let err = handle_predict(&state(bright_model()), request).await.unwrap_err();
        assert!(matches!(err, PadError::Configuration(_)));
        assert_eq!(error_status(&err), 422);
    }

    #[tokio::test]
    async fn larger_canvas_still_reduces_to_grid() {
        let reply = handle_predict(&state(bright_model()), body(8, 255)).await.unwrap();
        assert_eq!(reply.reduced, vec![vec![255.0, 255.0], vec![255.0, 255.0]]);
        assert_eq!(reply.label, "Digit: 1");
    }

    #[tokio::test]
    async fn missing_model_is_service_unavailable() {
        let classifier: Arc<dyn DigitClassifier> = Arc::new(LinearClassifier::unconfigured());
        let err = handle_predict(&state(classifier), body(4, 0)).await.unwrap_err();
        assert!(matches!(err, PadError::Inference(InferenceError::Unavailable(_))));
        assert_eq!(error_status(&err), 503);
    }

    #[tokio::test]
    async fn default_config_has_no_model() {
        let cfg = ServerConfig {
            bind_addr: DEFAULT_BIND.to_string(),
            model_path: None,
            pad: PadConfig::desktop(),
        };
        assert!(cfg.classifier().load().await.is_err());
    }

    #[cfg(feature = "web")]
    mod routes {
        use super::*;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        /// Sends one raw HTTP/1.1 request to a fresh server and returns the status
        /// and the JSON body.
        async fn send(raw: String) -> (u16, serde_json::Value) {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let app = router(state(bright_model()));
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            stream.write_all(raw.as_bytes()).await.unwrap();
            let mut response = Vec::new();
            stream.read_to_end(&mut response).await.unwrap();

            let text = String::from_utf8(response).unwrap();
            let (head, body) = text.split_once("\r\n\r\n").unwrap();
            let status = head.split_whitespace().nth(1).unwrap().parse().unwrap();
            (status, serde_json::from_str(body).unwrap())
        }

        fn post_predict(body: &serde_json::Value) -> String {
            let payload = body.to_string();
            format!(
                "POST /api/predict HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
                 Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                payload.len(),
                payload
            )
        }

        #[tokio::test]
        async fn config_route_serves_pad_config() {
            let (status, body) = send(
                "GET /api/config HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n".into(),
            )
            .await;
            assert_eq!(status, 200);
            assert_eq!(body["scale"], 2);
            assert_eq!(body["grid_side"], 2);
            assert_eq!(body["allows_multiple_draws"], false);
        }

        #[tokio::test]
        async fn predict_route_replies_with_sequence_and_error() {
            let request = serde_json::json!({
                "sequence": 5,
                "width": 4,
                "height": 2,
                "pixels": vec![0u8; 32],
            });
            let (status, body) = send(post_predict(&request)).await;
            assert_eq!(status, 422);
            assert_eq!(body["sequence"], 5);
            assert!(body["error"].as_str().unwrap().contains("must be square"));
        }

        #[tokio::test]
        async fn predict_route_returns_ranked_digits() {
            let request = serde_json::json!({
                "sequence": 6,
                "width": 4,
                "height": 4,
                "pixels": [255u8, 255, 255, 255].repeat(16),
            });
            let (status, body) = send(post_predict(&request)).await;
            assert_eq!(status, 200);
            assert_eq!(body["sequence"], 6);
            assert_eq!(body["label"], "Digit: 1");
            assert_eq!(body["prediction"][0]["digit"], 1);
        }
    }
}
