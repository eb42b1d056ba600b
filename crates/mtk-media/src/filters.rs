//! FFmpeg filter graph definitions.

/// Per-still normalisation: reset timestamps, fix the frame rate and pixel
/// format so the segments can be concatenated.
pub const SEGMENT_FILTER: &str = "settb=AVTB,setpts=PTS-STARTPTS,fps=fps=25,format=pix_fmts=yuv420p";

/// Label of the concatenated video stream.
pub const OUTPUT_VIDEO_LABEL: &str = "[outv]";

/// Build the `-filter_complex` graph for `count` looped still inputs.
///
/// Input `i` is normalised into `[vi]`, then all segments are concatenated
/// in order into [`OUTPUT_VIDEO_LABEL`].
pub fn build_concat_graph(count: usize) -> String {
    let mut graph = String::new();
    for i in 0..count {
        graph.push_str(&format!("[{}:v]{}[v{}];", i, SEGMENT_FILTER, i));
    }
    for i in 0..count {
        graph.push_str(&format!("[v{}]", i));
    }
    graph.push_str(&format!("concat=n={}:v=1:a=0{}", count, OUTPUT_VIDEO_LABEL));
    graph
}
