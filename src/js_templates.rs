//! Page-side scripts. Every template is a function expression meant to be
//! passed to `PageSurface::evaluate` together with its arguments.

use serde_json::Value;

/// Turns a function expression plus arguments into one evaluable expression.
pub fn invoke(script: &str, args: &[Value]) -> String {
    let args = serde_json::to_string(args).unwrap_or_else(|_| "[]".to_string());
    format!("({})(...{})", script.trim(), args)
}

/// Resolves a locator expression (XPath when it starts with `/` or `(`) to every match.
const RESOLVE_ALL: &str = r#"function resolveAll(expr){if(expr.startsWith('/')||expr.startsWith('(')){const snap=document.evaluate(expr,document,null,XPathResult.ORDERED_NODE_SNAPSHOT_TYPE,null);const out=[];for(let i=0;i<snap.snapshotLength;i++)out.push(snap.snapshotItem(i));return out}return Array.from(document.querySelectorAll(expr))}"#;

/// `(kind) => {key: value}` for `localStorage` or `sessionStorage`.
pub const STORAGE_SNAPSHOT: &str = r#"(kind)=>{const store=window[kind];const out={};for(let i=0;i<store.length;i++){const key=store.key(i);if(key!==null){out[key]=store.getItem(key)||''}}return out}"#;

/// `(kind, key, value) => void`.
pub const STORAGE_SET: &str = r#"(kind,key,value)=>{window[kind].setItem(key,value)}"#;

/// Returns whether the element bound to `this` is rendered.
pub const ELEMENT_VISIBLE: &str = r#"function(){const style=window.getComputedStyle(this);const rect=this.getBoundingClientRect();return style.display!=='none'&&style.visibility!=='hidden'&&parseFloat(style.opacity||'1')>0&&rect.width>0&&rect.height>0}"#;

/// Returns whether the element bound to `this` is rendered and inside the viewport.
pub const ELEMENT_INTERACTABLE: &str = r#"function(){const style=window.getComputedStyle(this);const rect=this.getBoundingClientRect();if(style.display==='none'||style.visibility==='hidden'||rect.width===0||rect.height===0)return false;const vw=window.innerWidth||document.documentElement.clientWidth;const vh=window.innerHeight||document.documentElement.clientHeight;return rect.bottom>0&&rect.right>0&&rect.top<vh&&rect.left<vw}"#;

/// `(containerExpr, binding, slot) => bool`: observes the QR container and
/// reports the `src` of every image added under it once it has loaded.
pub fn qr_observer() -> String {
    format!(
        r#"(containerExpr,binding,slot)=>{{{RESOLVE_ALL}
const container=resolveAll(containerExpr)[0];
if(!container)return false;
if(window[slot])window[slot].disconnect();
const report=(img)=>{{const send=()=>{{if(img.src)window[binding](img.src)}};if(img.complete&&img.naturalWidth>0){{send()}}else{{img.addEventListener('load',send,{{once:true}})}}}};
const observer=new MutationObserver((mutations)=>{{for(const m of mutations){{m.addedNodes.forEach((node)=>{{if(node instanceof HTMLImageElement){{report(node)}}else if(node.querySelectorAll){{node.querySelectorAll('img').forEach(report)}}}})}}}});
observer.observe(container,{{attributes:true,childList:true,subtree:true,characterData:true}});
window[slot]=observer;
return true}}"#
    )
}

/// `(slot) => void`: disconnects an observer installed by [`qr_observer`].
pub const DISCONNECT_OBSERVER: &str =
    r#"(slot)=>{if(window[slot]){window[slot].disconnect();delete window[slot]}}"#;

/// `(itemExpr) => [{href, unread, timestamp, from, snippet}]` for the conversation list.
pub fn conversation_snapshot() -> String {
    format!(
        r#"(itemExpr)=>{{{RESOLVE_ALL}
const text=(el)=>el?(el.innerText||el.textContent||'').trim():'';
return resolveAll(itemExpr).map((item)=>{{const link=item.querySelector('a');const stamp=item.querySelector('mws-relative-timestamp');let timestamp='';if(stamp){{const labelled=stamp.querySelector('[aria-label]');timestamp=labelled?labelled.getAttribute('aria-label'):text(stamp)}}
return{{href:link?link.href:'',unread:!!item.querySelector('.unread'),timestamp:timestamp||'',from:text(item.querySelector('h3')),snippet:text(item.querySelector('mws-conversation-snippet'))}}}})}}"#
    )
}
