use warp::Filter;

macro_rules! include_static {
    ($($path:expr),* $(,)?) => {
        &[
            $(($path, include_str!(concat!("../static/", $path)))),*
        ]
    };
}

const STATIC_FILES: &[(&str, &str)] = include_static!["css/main.css", "js/app.js"];

const INDEX_HTML: &str = include_str!("../static/index.html");

pub fn content_type_from_path(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("html") => "text/html",
        _ => "text/plain",
    }
}

/// Looks up a bundled gallery asset by its request path.
pub fn find_static(path: &str) -> Option<&'static str> {
    let path = path.trim_start_matches('/');
    if path.is_empty() || path == "index.html" {
        return Some(INDEX_HTML);
    }
    STATIC_FILES
        .iter()
        .find(|(file_path, _)| *file_path == path)
        .map(|(_, content)| *content)
}

pub fn build_static_routes(
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let index_route = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::with_header(INDEX_HTML, "content-type", "text/html"));

    let file_route = warp::path::full().and(warp::get()).and_then(
        |full_path: warp::path::FullPath| async move {
            let path = full_path.as_str();
            match find_static(path) {
                Some(content) => Ok::<_, warp::Rejection>(warp::reply::with_header(
                    content,
                    "content-type",
                    content_type_from_path(path),
                )),
                None => Err(warp::reject::not_found()),
            }
        },
    );

    index_route.or(file_route)
}
