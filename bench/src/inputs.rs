const PASSAGE: &str = "\
To Sherlock Holmes she is always the woman. I have seldom heard him mention \
her under any other name. In his eyes she eclipses and predominates the \
whole of her sex. It was not that he felt any emotion akin to love for \
Irene Adler. All emotions, and that one particularly, were abhorrent to his \
cold, precise but admirably balanced mind. He was, I take it, the most \
perfect reasoning and observing machine that the world has seen, but as a \
lover he would have placed himself in a false position.\n";

/// Returns roughly `len` bytes of English prose.
pub fn prose(len: usize) -> Vec<u8> {
    PASSAGE.bytes().cycle().take(len).collect()
}

/// Returns `len` bytes of a single repeated byte.
pub fn flood(byte: u8, len: usize) -> Vec<u8> {
    vec![byte; len]
}

/// Returns `count` distinct words, none of which occur in `prose`.
pub fn words(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("zq{}x{}", i, i % 7)).collect()
}
