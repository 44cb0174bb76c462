//! Shared fixtures for unit tests: a tiny word-level tokenizer and a tiny
//! randomly initialized T5 model small enough to run on the CPU.

use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use candle_transformers::models::t5::Config;

use crate::model::seq2seq::Seq2SeqModel;

/// Words known to the test tokenizer, after the three special tokens.
pub const TEST_WORDS: [&str; 26] = [
    "summarize", ":", "amanda", "i", "baked", "cookies", ".", "jerry", "can", "have", "some",
    "?", "for", "tom", "ok", "agrees", "asks", "greets", "hi", "yo", "a", "b", "the", "cat",
    "sat", "wants",
];

/// Vocabulary size of the tiny model; covers every test token.
pub const TINY_VOCAB: usize = 32;

/// Writes a lowercasing word-level `tokenizer.json` that appends `</s>`.
///
/// Ids: `<pad>` 0, `</s>` 1, `<unk>` 2, then [`TEST_WORDS`] in order.
pub fn write_test_tokenizer(dir: &Path) -> PathBuf {
    let mut vocab = serde_json::json!({"<pad>": 0, "</s>": 1, "<unk>": 2});
    for (i, word) in TEST_WORDS.iter().enumerate() {
        vocab[*word] = serde_json::json!(i + 3);
    }
    let special = |id: u32, content: &str| {
        serde_json::json!({
            "id": id, "content": content, "single_word": false, "lstrip": false,
            "rstrip": false, "normalized": false, "special": true
        })
    };
    let tokenizer = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [special(0, "<pad>"), special(1, "</s>"), special(2, "<unk>")],
        "normalizer": {"type": "Lowercase"},
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": {
            "type": "TemplateProcessing",
            "single": [
                {"Sequence": {"id": "A", "type_id": 0}},
                {"SpecialToken": {"id": "</s>", "type_id": 0}}
            ],
            "pair": [
                {"Sequence": {"id": "A", "type_id": 0}},
                {"SpecialToken": {"id": "</s>", "type_id": 0}},
                {"Sequence": {"id": "B", "type_id": 0}},
                {"SpecialToken": {"id": "</s>", "type_id": 0}}
            ],
            "special_tokens": {
                "</s>": {"id": "</s>", "ids": [1], "tokens": ["</s>"]}
            }
        },
        "decoder": null,
        "model": {"type": "WordLevel", "vocab": vocab, "unk_token": "<unk>"}
    });

    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join("tokenizer.json");
    std::fs::write(&path, serde_json::to_string_pretty(&tokenizer).unwrap()).unwrap();
    path
}

/// `config.json` of a one-layer T5 with an 8-wide hidden state.
pub fn tiny_t5_config_json() -> String {
    serde_json::json!({
        "vocab_size": TINY_VOCAB,
        "d_model": 8,
        "d_kv": 4,
        "d_ff": 16,
        "num_layers": 1,
        "num_decoder_layers": 1,
        "num_heads": 2,
        "relative_attention_num_buckets": 8,
        "relative_attention_max_distance": 16,
        "dropout_rate": 0.0,
        "layer_norm_epsilon": 1e-6,
        "initializer_factor": 1.0,
        "feed_forward_proj": "relu",
        "tie_word_embeddings": true,
        "is_decoder": false,
        "is_encoder_decoder": true,
        "use_cache": false,
        "pad_token_id": 0,
        "eos_token_id": 1,
        "decoder_start_token_id": 0
    })
    .to_string()
}

/// Parsed tiny config.
pub fn tiny_t5_config() -> Config {
    serde_json::from_str(&tiny_t5_config_json()).unwrap()
}

/// A randomly initialized tiny model and the variables backing it.
pub fn tiny_model() -> (Seq2SeqModel, VarMap) {
    let varmap = VarMap::new();
    let device = Device::Cpu;
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let model = Seq2SeqModel::from_var_builder(vb, tiny_t5_config(), &device).unwrap();
    (model, varmap)
}

/// Writes a complete checkpoint directory (`config.json`,
/// `model.safetensors`, `tokenizer.json`) for the tiny model.
pub fn write_tiny_checkpoint(dir: &Path) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let (_model, varmap) = tiny_model();
    varmap.save(dir.join("model.safetensors")).unwrap();
    std::fs::write(dir.join("config.json"), tiny_t5_config_json()).unwrap();
    write_test_tokenizer(dir);
    dir.to_path_buf()
}

/// Writes a zip archive holding `entries` (`(name, contents)` pairs).
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (name, contents) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

/// Writes `<root>/<split>.jsonl` from `(dialogue, summary)` rows.
pub fn write_jsonl_split(root: &Path, split: &str, rows: &[(&str, &str)]) {
    std::fs::create_dir_all(root).unwrap();
    let lines: Vec<String> = rows
        .iter()
        .enumerate()
        .map(|(i, (dialogue, summary))| {
            serde_json::json!({"id": i.to_string(), "dialogue": dialogue, "summary": summary})
                .to_string()
        })
        .collect();
    std::fs::write(root.join(format!("{split}.jsonl")), lines.join("\n") + "\n").unwrap();
}
